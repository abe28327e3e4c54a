//! One-time migration of the legacy key-value payload into the storage file.
//!
//! Each step runs only if the previous one succeeded:
//! 1. flag already set: nothing to do
//! 2. no decodable legacy payload: set the flag, flush it and stop
//! 3. save the legacy collection to the file
//! 4. read it back and compare record counts
//! 5. set the flag and flush it
//! 6. delete the legacy payload
//!
//! Any failure in 2-5 leaves the flag unset and the payload in place, so the
//! next launch starts over. The flag is always durable before the payload is
//! deleted.

use crate::key_value::KeyValueStore;
use crate::store::DurableLoadStore;
use crate::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info, warn};

/// Result of a migration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The flag was already set; nothing was read or written.
    AlreadyCompleted,
    /// No legacy payload, or one that did not decode. The flag is now set
    /// and flushed.
    NothingToMigrate,
    /// `count` records were copied and verified; the legacy payload is gone.
    Migrated { count: usize },
    /// The copy could not be completed or verified, or the flag could not
    /// be made durable. The flag is still unset and the legacy payload is
    /// untouched.
    Aborted { reason: String },
}

impl<T, K> DurableLoadStore<T, K>
where
    T: Serialize + DeserializeOwned,
    K: KeyValueStore,
{
    pub(crate) fn run_migration(&self) -> MigrationOutcome {
        let flag_key = self.config.migration_flag_key.as_str();
        let legacy_key = self.config.legacy_payload_key.as_str();

        if self.key_value.get_bool(flag_key) {
            return MigrationOutcome::AlreadyCompleted;
        }

        let Some(legacy) = self.read_legacy() else {
            self.key_value.set_bool(flag_key, true);
            if let Err(e) = self.key_value.flush() {
                self.key_value.set_bool(flag_key, false);
                return abort(e);
            }
            info!("No legacy training loads to migrate");
            return MigrationOutcome::NothingToMigrate;
        };

        let expected = legacy.len();
        info!(count = expected, "Migrating legacy training loads");

        if let Err(e) = self.save_all(&legacy) {
            return abort(e);
        }

        let found = self.load_all().len();
        if found != expected {
            return abort(StoreError::Verification { expected, found });
        }

        self.key_value.set_bool(flag_key, true);
        if let Err(e) = self.key_value.flush() {
            self.key_value.set_bool(flag_key, false);
            return abort(e);
        }

        self.key_value.delete(legacy_key);
        if let Err(e) = self.key_value.flush() {
            // The flag is durable, so a leftover payload is only redundant.
            warn!(error = %e, "Failed to persist legacy payload removal");
        }

        info!(count = expected, "Legacy training load migration completed");
        MigrationOutcome::Migrated { count: expected }
    }

    fn read_legacy(&self) -> Option<Vec<T>> {
        let blob = self.key_value.get_blob(&self.config.legacy_payload_key)?;
        match serde_json::from_slice(&blob) {
            Ok(loads) => Some(loads),
            Err(e) => {
                warn!(
                    error = %e,
                    bytes = blob.len(),
                    "Legacy training loads could not be decoded, treating as absent"
                );
                None
            }
        }
    }
}

fn abort(reason: StoreError) -> MigrationOutcome {
    error!(error = %reason, "Training load migration aborted, legacy data kept for retry");
    MigrationOutcome::Aborted {
        reason: reason.to_string(),
    }
}
