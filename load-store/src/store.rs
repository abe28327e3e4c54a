use crate::config::{DirectoryResolver, StoreConfig};
use crate::format::format_file_size;
use crate::json_file::JsonFile;
use crate::key_value::KeyValueStore;
use crate::migration::MigrationOutcome;
use crate::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// Whole-collection store for training-load records, backed by one JSON file.
///
/// Construction runs the legacy migration check once. After that every call
/// is a direct file operation; there is no caching and no locking, so only
/// one instance per process should write to a given directory.
pub struct DurableLoadStore<T, K> {
    pub(crate) file: JsonFile<Vec<T>>,
    pub(crate) key_value: K,
    pub(crate) config: StoreConfig,
    initial_migration: MigrationOutcome,
}

impl<T, K> DurableLoadStore<T, K>
where
    T: Serialize + DeserializeOwned,
    K: KeyValueStore,
{
    /// Open a store in `data_dir` with the default file name and keys.
    pub fn new(data_dir: impl Into<PathBuf>, key_value: K) -> Self {
        Self::with_config(data_dir, key_value, StoreConfig::default())
    }

    /// Open a store in the directory chosen by `resolver`.
    pub fn open(resolver: &dyn DirectoryResolver, key_value: K) -> Result<Self, StoreError> {
        let data_dir = resolver.data_dir()?;
        Ok(Self::new(data_dir, key_value))
    }

    pub fn with_config(data_dir: impl Into<PathBuf>, key_value: K, config: StoreConfig) -> Self {
        let path = data_dir.into().join(&config.file_name);
        let mut store = Self {
            file: JsonFile::new(path),
            key_value,
            config,
            initial_migration: MigrationOutcome::AlreadyCompleted,
        };
        store.initial_migration = store.run_migration();
        store
    }

    /// Load every record. A missing file is an empty collection; a file that
    /// cannot be read or decoded is logged and also yields an empty collection.
    pub fn load_all(&self) -> Vec<T> {
        match self.file.read() {
            Ok(Some(loads)) => {
                tracing::debug!(
                    path = %self.file.path().display(),
                    count = loads.len(),
                    "Loaded training loads"
                );
                loads
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.file.path().display(),
                    error = %e,
                    "Failed to load training loads, returning empty collection"
                );
                Vec::new()
            }
        }
    }

    /// Replace the stored collection with `loads`.
    pub fn save_all(&self, loads: &[T]) -> Result<(), StoreError> {
        match self.file.write(loads) {
            Ok(()) => {
                tracing::debug!(
                    path = %self.file.path().display(),
                    count = loads.len(),
                    "Saved training loads"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    path = %self.file.path().display(),
                    error = %e,
                    "Failed to save training loads"
                );
                Err(e)
            }
        }
    }

    /// Delete the storage file. Succeeds if there is nothing to delete.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        if self.file.remove()? {
            tracing::info!(path = %self.file.path().display(), "Cleared training loads");
        } else {
            tracing::debug!(path = %self.file.path().display(), "No training loads to clear");
        }
        Ok(())
    }

    /// Size of the storage file in bytes, 0 if it is missing or unreadable.
    pub fn storage_size_bytes(&self) -> u64 {
        match self.file.size_bytes() {
            Ok(size) => size.unwrap_or(0),
            Err(e) => {
                tracing::warn!(
                    path = %self.file.path().display(),
                    error = %e,
                    "Failed to stat storage file"
                );
                0
            }
        }
    }

    pub fn storage_size_formatted(&self) -> String {
        format_file_size(self.storage_size_bytes())
    }

    /// Reset the migration flag and run the migration again.
    pub fn force_migration(&self) -> MigrationOutcome {
        tracing::info!("Forcing training load migration");
        self.key_value.set_bool(&self.config.migration_flag_key, false);
        if let Err(e) = self.key_value.flush() {
            tracing::warn!(error = %e, "Failed to persist migration flag reset");
        }
        self.run_migration()
    }

    pub fn migration_completed(&self) -> bool {
        self.key_value.get_bool(&self.config.migration_flag_key)
    }

    /// Outcome of the migration check run when this store was constructed.
    pub fn initial_migration(&self) -> &MigrationOutcome {
        &self.initial_migration
    }

    pub fn storage_path(&self) -> &Path {
        self.file.path()
    }

    pub fn key_value(&self) -> &K {
        &self.key_value
    }
}
