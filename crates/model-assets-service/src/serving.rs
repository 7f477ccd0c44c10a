//! Serving configuration emission
//!
//! Turns resolved model paths into the configuration file a model-serving
//! runtime reads. TensorFlow Serving expects a `model_config_list` in protobuf
//! text format, with one version directory per model below `base_path`.

use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, instrument};

use crate::dto::ServingEntry;
use crate::error::{ServiceError, ServiceResult};

/// Renders serving entries into a runtime configuration
#[cfg_attr(test, mockall::automock)]
pub trait ServingConfigWriter: Send + Sync {
    /// Render the configuration text
    fn render(&self, entries: &[ServingEntry]) -> String;
}

/// TensorFlow Serving `model_config_list` writer
#[derive(Debug, Clone, Default)]
pub struct TfServingConfigWriter {
    model_platform: Option<String>,
}

impl TfServingConfigWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the `model_platform` of every entry
    pub fn with_model_platform(mut self, platform: impl Into<String>) -> Self {
        self.model_platform = Some(platform.into());
        self
    }

    fn platform(&self) -> &str {
        self.model_platform.as_deref().unwrap_or("tensorflow")
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl ServingConfigWriter for TfServingConfigWriter {
    fn render(&self, entries: &[ServingEntry]) -> String {
        let configs: Vec<String> = entries
            .iter()
            .map(|entry| {
                let mut config = String::new();
                let _ = writeln!(config, "  config: {{");
                let _ = writeln!(config, "    name: {},", quoted(&entry.name));
                let _ = writeln!(config, "    base_path: {},", quoted(&entry.base_path));
                let _ = writeln!(config, "    model_platform: {}", quoted(self.platform()));
                config.push_str("  }");
                config
            })
            .collect();

        format!("model_config_list: {{\n{}\n}}\n", configs.join(",\n"))
    }
}

/// Render `entries` and write them to `target`
///
/// The file is written next to its target and renamed into place.
#[instrument(skip(writer, entries), fields(target = %target.display(), models = entries.len()))]
pub async fn write_serving_config(
    writer: &dyn ServingConfigWriter,
    entries: &[ServingEntry],
    target: &Path,
) -> ServiceResult<()> {
    let parent = target.parent().ok_or_else(|| {
        ServiceError::Internal(format!("`{}` has no parent directory", target.display()))
    })?;
    tokio::fs::create_dir_all(parent).await?;

    let staged = parent.join(format!(
        ".{}.tmp",
        target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));
    tokio::fs::write(&staged, writer.render(entries)).await?;
    tokio::fs::rename(&staged, target).await?;

    info!("Wrote serving configuration");
    Ok(())
}
