//! In-flight fetch table
//!
//! At most one fetch runs per resolved asset key. The first caller spawns the
//! fetch as its own task and registers a shared handle to its outcome; later
//! callers for the same key clone that handle instead of starting a second
//! transfer. The mutex only guards the map, never the transfer itself, so
//! fetches for different keys proceed in parallel.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

type SharedFetch<T> = Shared<BoxFuture<'static, ServiceResult<T>>>;

/// Per-key registry of running fetches
pub(crate) struct InflightFetches<K, T> {
    entries: Arc<Mutex<HashMap<K, SharedFetch<T>>>>,
}

/// Removes the key once its task finishes, even if the fetch panicked
struct EntryGuard<K: Hash + Eq, T> {
    entries: Arc<Mutex<HashMap<K, SharedFetch<T>>>>,
    key: K,
}

impl<K: Hash + Eq, T> Drop for EntryGuard<K, T> {
    fn drop(&mut self) {
        lock(&self.entries).remove(&self.key);
    }
}

fn lock<K, T>(
    entries: &Mutex<HashMap<K, SharedFetch<T>>>,
) -> MutexGuard<'_, HashMap<K, SharedFetch<T>>> {
    // The map stays consistent even if a holder panicked
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, T> InflightFetches<K, T>
where
    K: Hash + Eq + Clone + std::fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `fetch` for `key`, or join the fetch already running for it
    ///
    /// The fetch runs to completion even if every caller stops waiting.
    pub(crate) async fn run<F>(&self, key: K, fetch: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>> + Send + 'static,
    {
        let handle = {
            let mut entries = lock(&self.entries);
            match entries.get(&key) {
                Some(existing) => {
                    debug!(?key, "Joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    let guard = EntryGuard {
                        entries: Arc::clone(&self.entries),
                        key: key.clone(),
                    };
                    // The guard waits on this lock, so the entry is always
                    // inserted before it can be removed
                    let task = tokio::spawn(async move {
                        let _guard = guard;
                        fetch.await
                    });
                    let handle = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(ServiceError::Internal(format!("fetch task failed: {}", e)))
                        })
                    }
                    .boxed()
                    .shared();
                    entries.insert(key, handle.clone());
                    handle
                }
            }
        };

        handle.await
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}
