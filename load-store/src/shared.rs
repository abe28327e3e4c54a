use crate::config::{self, DirectoryResolver, PlatformDirectories, PREFERENCES_FILE_NAME};
use crate::key_value::FileKeyValueStore;
use crate::store::DurableLoadStore;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::OnceLock;

/// Process-wide store, created on first use.
///
/// Meant to live in a `static`:
///
/// ```no_run
/// use load_store::SharedStore;
///
/// static LOADS: SharedStore<u32> = SharedStore::new();
///
/// let loads = LOADS.get().load_all();
/// ```
///
/// The first `get` opens the key-value store and the storage file in the same
/// data directory and runs the migration check. Later calls return the same
/// instance.
pub struct SharedStore<T> {
    cell: OnceLock<DurableLoadStore<T, FileKeyValueStore>>,
}

impl<T> SharedStore<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }
}

impl<T> Default for SharedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> SharedStore<T> {
    /// The store in the per-user data directory. If the instance was already
    /// created by [`SharedStore::get_in`], that instance is returned.
    pub fn get(&self) -> &DurableLoadStore<T, FileKeyValueStore> {
        self.get_in(&PlatformDirectories)
    }

    /// The store in the directory chosen by `resolver`. Only the first call
    /// decides the directory; later calls return the same instance wherever
    /// their resolver points.
    ///
    /// If the preferences file exists but cannot be read, it is left alone:
    /// the key-value store is opened read-only, the migration aborts, and the
    /// next launch checks again.
    pub fn get_in(
        &self,
        resolver: &dyn DirectoryResolver,
    ) -> &DurableLoadStore<T, FileKeyValueStore> {
        if let Some(store) = self.cell.get() {
            if let Ok(requested) = resolver.data_dir() {
                if store.storage_path().parent() != Some(requested.as_path()) {
                    tracing::debug!(
                        requested = %requested.display(),
                        current = %store.storage_path().display(),
                        "Training load store already open elsewhere, ignoring directory"
                    );
                }
            }
            return store;
        }

        self.cell.get_or_init(|| {
            let data_dir = config::resolve_data_dir(resolver);
            tracing::info!(data_dir = %data_dir.display(), "Opening training load store");
            let prefs_path = data_dir.join(PREFERENCES_FILE_NAME);
            let key_value = match FileKeyValueStore::open(prefs_path.clone()) {
                Ok(key_value) => key_value,
                Err(e) => {
                    tracing::error!(
                        path = %prefs_path.display(),
                        error = %e,
                        "Failed to open key-value store, leaving it untouched"
                    );
                    FileKeyValueStore::unavailable(prefs_path)
                }
            };
            DurableLoadStore::new(data_dir, key_value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixedDirectory, LEGACY_PAYLOAD_KEY, MIGRATION_FLAG_KEY};
    use crate::key_value::KeyValueStore;
    use crate::MigrationOutcome;

    #[test]
    fn test_first_get_migrates_and_later_gets_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let seed = FileKeyValueStore::open(dir.path().join(PREFERENCES_FILE_NAME)).unwrap();
        seed.set_blob(LEGACY_PAYLOAD_KEY, b"[7, 8]".to_vec());
        seed.flush().unwrap();

        let shared: SharedStore<u32> = SharedStore::new();
        let resolver = FixedDirectory(dir.path().to_path_buf());
        let first = shared.get_in(&resolver);
        assert_eq!(
            first.initial_migration(),
            &MigrationOutcome::Migrated { count: 2 }
        );

        let other = FixedDirectory(dir.path().join("elsewhere"));
        let second = shared.get_in(&other);
        assert!(std::ptr::eq(first, second));
        assert_eq!(second.load_all(), vec![7, 8]);

        let on_disk = FileKeyValueStore::open(dir.path().join(PREFERENCES_FILE_NAME)).unwrap();
        assert!(on_disk.get_bool(MIGRATION_FLAG_KEY));
        assert_eq!(on_disk.get_blob(LEGACY_PAYLOAD_KEY), None);
    }

    #[test]
    fn test_usable_as_static() {
        static STORE: SharedStore<u32> = SharedStore::new();
        let dir = tempfile::tempdir().unwrap();
        let store = STORE.get_in(&FixedDirectory(dir.path().to_path_buf()));
        store.save_all(&[1, 2, 3]).unwrap();
        let again = STORE.get_in(&FixedDirectory(dir.path().join("ignored")));
        assert_eq!(again.load_all(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unreadable_preferences_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = dir.path().join(PREFERENCES_FILE_NAME);
        let corrupt = "{\"training_load_data\": {\"blob\": [91, 49, 93]}, \"units\": ";
        std::fs::write(&prefs, corrupt).unwrap();

        let shared: SharedStore<u32> = SharedStore::new();
        let store = shared.get_in(&FixedDirectory(dir.path().to_path_buf()));

        assert!(matches!(
            store.initial_migration(),
            MigrationOutcome::Aborted { .. }
        ));
        assert!(!store.migration_completed());
        assert!(!store.storage_path().exists());
        assert_eq!(std::fs::read_to_string(&prefs).unwrap(), corrupt);

        // Once the file is readable again, a fresh launch migrates it.
        std::fs::write(&prefs, r#"{"training_load_data": {"blob": [91, 49, 93]}}"#).unwrap();
        let relaunched: SharedStore<u32> = SharedStore::new();
        let store = relaunched.get_in(&FixedDirectory(dir.path().to_path_buf()));
        assert_eq!(
            store.initial_migration(),
            &MigrationOutcome::Migrated { count: 1 }
        );
        assert_eq!(store.load_all(), vec![1]);
    }
}
