//! Durable storage for per-day training-load records.
//!
//! The whole record collection lives in a single JSON file inside a per-user
//! data directory. On first construction the store migrates any collection
//! left behind in the legacy key-value store, verifying the copy before the
//! legacy data is dropped.

pub mod config;
pub mod format;
mod json_file;
pub mod key_value;
mod migration;
mod shared;
mod store;

pub use config::{DirectoryResolver, FixedDirectory, PlatformDirectories, StoreConfig};
pub use key_value::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use migration::MigrationOutcome;
pub use shared::SharedStore;
pub use store::DurableLoadStore;

use std::path::PathBuf;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to replace {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Key-value store at {path:?} could not be opened and is read-only")]
    KeyValueUnavailable { path: PathBuf },
    #[error("No per-user data directory is available on this platform")]
    NoDataDirectory,
    #[error("Read-back returned {found} records, expected {expected}")]
    Verification { expected: usize, found: usize },
}
