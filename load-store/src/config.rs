//! Configuration for the training-load store
//!
//! Fixed file names and key names, plus the directory the store lives in:
//! 1. an explicit path (`FixedDirectory`), used by tests and embedders
//! 2. the per-user data directory of the application (`PlatformDirectories`)
//! 3. ./data, when the platform reports no home directory

use std::path::PathBuf;

use crate::StoreError;

/// File holding the JSON array of records.
pub const STORAGE_FILE_NAME: &str = "training_loads.json";

/// File backing `FileKeyValueStore` inside the data directory.
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

/// Boolean key marking the legacy migration as done.
pub const MIGRATION_FLAG_KEY: &str = "training_load_migration_completed";

/// Blob key holding the pre-migration collection.
pub const LEGACY_PAYLOAD_KEY: &str = "training_load_data";

const FALLBACK_DATA_DIR: &str = "./data";

const APP_QUALIFIER: &str = "";
const APP_ORGANIZATION: &str = "";
const APP_NAME: &str = "training-load";

/// File name and key names used by a `DurableLoadStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub file_name: String,
    pub migration_flag_key: String,
    pub legacy_payload_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file_name: STORAGE_FILE_NAME.to_string(),
            migration_flag_key: MIGRATION_FLAG_KEY.to_string(),
            legacy_payload_key: LEGACY_PAYLOAD_KEY.to_string(),
        }
    }
}

/// Resolves the user-private, persistent directory the store writes into.
pub trait DirectoryResolver {
    fn data_dir(&self) -> Result<PathBuf, StoreError>;
}

/// Per-user data directory for this application, e.g.
/// `~/.local/share/training-load` on Linux.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformDirectories;

impl DirectoryResolver for PlatformDirectories {
    fn data_dir(&self) -> Result<PathBuf, StoreError> {
        directories::ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(StoreError::NoDataDirectory)
    }
}

/// Resolve the data directory, falling back to ./data when `resolver` fails.
pub fn resolve_data_dir(resolver: &dyn DirectoryResolver) -> PathBuf {
    match resolver.data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = FALLBACK_DATA_DIR,
                "Data directory unavailable, using fallback"
            );
            PathBuf::from(FALLBACK_DATA_DIR)
        }
    }
}

/// An explicitly chosen directory.
#[derive(Debug, Clone)]
pub struct FixedDirectory(pub PathBuf);

impl DirectoryResolver for FixedDirectory {
    fn data_dir(&self) -> Result<PathBuf, StoreError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_fixed_names() {
        let config = StoreConfig::default();
        assert_eq!(config.file_name, "training_loads.json");
        assert_eq!(config.migration_flag_key, MIGRATION_FLAG_KEY);
        assert_eq!(config.legacy_payload_key, LEGACY_PAYLOAD_KEY);
        assert_ne!(config.migration_flag_key, config.legacy_payload_key);
    }

    #[test]
    fn test_fixed_directory_returns_its_path() {
        let dir = FixedDirectory(PathBuf::from("/tmp/loads"));
        assert_eq!(dir.data_dir().unwrap(), PathBuf::from("/tmp/loads"));
    }

    struct NoDirectory;

    impl DirectoryResolver for NoDirectory {
        fn data_dir(&self) -> Result<PathBuf, StoreError> {
            Err(StoreError::NoDataDirectory)
        }
    }

    #[test]
    fn test_resolve_data_dir_fallback() {
        assert_eq!(resolve_data_dir(&NoDirectory), PathBuf::from("./data"));
        let fixed = FixedDirectory(PathBuf::from("/var/loads"));
        assert_eq!(resolve_data_dir(&fixed), PathBuf::from("/var/loads"));
    }

    #[test]
    fn test_platform_directory_ends_with_app_name() {
        // Sandboxed CI may have no HOME; only check the path when one resolves.
        if let Ok(dir) = PlatformDirectories.data_dir() {
            assert!(dir.to_string_lossy().contains(APP_NAME));
        }
    }
}
