//! Test fixtures
//!
//! This module provides the bucket layout shared by the integration tests.

use std::path::Path;

/// Key namespace of the fixture bucket
pub const PREFIX: &str = "modelkit-assets";

/// Objects of the fixture bucket, relative to [`PREFIX`]
pub const OBJECTS: &[(&str, &[u8])] = &[
    ("m/1.0", b"m version 1.0"),
    ("m/1.2/weights.bin", b"m 1.2 weights"),
    ("m/1.2/vocab/words.txt", b"m 1.2 words"),
    ("m/2.0", b"m version 2.0"),
    ("category/classifier/0.3/saved_model.pb", b"graph"),
    ("a/1.0", b"asset a"),
    ("c/1.0", b"asset c"),
];

/// Write every fixture object below `root`
pub fn populate_bucket(root: &Path) {
    for (key, data) in OBJECTS {
        let path = root.join(PREFIX).join(key);
        std::fs::create_dir_all(path.parent().expect("fixture key has a parent"))
            .expect("Failed to create fixture directory");
        std::fs::write(&path, data).expect("Failed to write fixture object");
    }
}
