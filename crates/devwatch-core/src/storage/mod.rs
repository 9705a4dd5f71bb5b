//! Persistent key/value storage.

pub mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Get the default data directory for devwatch.
///
/// Uses the `directories` crate to find the appropriate platform-specific
/// data directory.
pub fn default_data_dir() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "devwatch", "devwatch")
        .map(|dirs| dirs.data_dir().to_path_buf())
}
