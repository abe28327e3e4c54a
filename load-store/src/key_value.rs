//! Key-value store abstraction holding the migration flag and the legacy
//! payload.
//!
//! Reads see buffered writes immediately; `flush` makes them durable. Callers
//! that must not proceed before a value is on disk call `flush` and check it.

use crate::json_file::JsonFile;
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Named scalar storage, in the manner of a platform preferences store.
pub trait KeyValueStore {
    /// Returns false when the key is absent or holds a blob.
    fn get_bool(&self, key: &str) -> bool;
    fn set_bool(&self, key: &str, value: bool);
    fn get_blob(&self, key: &str) -> Option<Vec<u8>>;
    fn set_blob(&self, key: &str, value: Vec<u8>);
    fn delete(&self, key: &str);
    /// Persist every buffered write.
    fn flush(&self) -> Result<(), StoreError>;
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for Arc<K> {
    fn get_bool(&self, key: &str) -> bool {
        (**self).get_bool(key)
    }

    fn set_bool(&self, key: &str, value: bool) {
        (**self).set_bool(key, value);
    }

    fn get_blob(&self, key: &str) -> Option<Vec<u8>> {
        (**self).get_blob(key)
    }

    fn set_blob(&self, key: &str, value: Vec<u8>) {
        (**self).set_blob(key, value);
    }

    fn delete(&self, key: &str) {
        (**self).delete(key);
    }

    fn flush(&self) -> Result<(), StoreError> {
        (**self).flush()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StoredValue {
    Bool(bool),
    Blob(Vec<u8>),
}

// Raw JSON per key, so entries written by other parts of the app pass through
// a read-modify-flush cycle untouched.
type Values = BTreeMap<String, serde_json::Value>;

#[derive(Default)]
struct State {
    values: Values,
    dirty: bool,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn stored(state: &Mutex<State>, key: &str) -> Option<StoredValue> {
    let raw = lock(state).values.get(key).cloned()?;
    serde_json::from_value(raw).ok()
}

fn get_bool(state: &Mutex<State>, key: &str) -> bool {
    matches!(stored(state, key), Some(StoredValue::Bool(true)))
}

fn get_blob(state: &Mutex<State>, key: &str) -> Option<Vec<u8>> {
    match stored(state, key) {
        Some(StoredValue::Blob(bytes)) => Some(bytes),
        _ => None,
    }
}

fn put(state: &Mutex<State>, key: &str, value: StoredValue) {
    let raw = match serde_json::to_value(&value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(key, error = %e, "Failed to encode key-value entry");
            return;
        }
    };
    let mut state = lock(state);
    state.values.insert(key.to_string(), raw);
    state.dirty = true;
}

fn remove(state: &Mutex<State>, key: &str) {
    let mut state = lock(state);
    if state.values.remove(key).is_some() {
        state.dirty = true;
    }
}

/// Key-value store persisted as a JSON map in a single file.
///
/// Entries this store did not write are kept as they are. A store created
/// with [`FileKeyValueStore::unavailable`] never writes its file.
pub struct FileKeyValueStore {
    file: JsonFile<Values>,
    state: Mutex<State>,
    writable: bool,
}

impl FileKeyValueStore {
    /// Open the store at `path`. A missing file starts empty. A file that
    /// cannot be read or is not a JSON object is an error, and is left as is.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let file = JsonFile::new(path);
        let values = file.read()?.unwrap_or_default();
        Ok(Self {
            file,
            state: Mutex::new(State {
                values,
                dirty: false,
            }),
            writable: true,
        })
    }

    /// An empty store for a file that could not be opened. Reads see only
    /// values set in this process and every `flush` fails, so the file on
    /// disk is never replaced.
    pub fn unavailable(path: PathBuf) -> Self {
        Self {
            file: JsonFile::new(path),
            state: Mutex::new(State::default()),
            writable: false,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get_bool(&self, key: &str) -> bool {
        get_bool(&self.state, key)
    }

    fn set_bool(&self, key: &str, value: bool) {
        put(&self.state, key, StoredValue::Bool(value));
    }

    fn get_blob(&self, key: &str) -> Option<Vec<u8>> {
        get_blob(&self.state, key)
    }

    fn set_blob(&self, key: &str, value: Vec<u8>) {
        put(&self.state, key, StoredValue::Blob(value));
    }

    fn delete(&self, key: &str) {
        remove(&self.state, key);
    }

    fn flush(&self) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::KeyValueUnavailable {
                path: self.file.path().to_path_buf(),
            });
        }
        let mut state = lock(&self.state);
        if !state.dirty {
            return Ok(());
        }
        self.file.write(&state.values)?;
        state.dirty = false;
        tracing::debug!(path = %self.file.path().display(), "Flushed key-value store");
        Ok(())
    }
}

/// In-process key-value store. `fail_flushes` makes every later `flush`
/// return an error, for exercising durability failures.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    state: Mutex<State>,
    fail_flush: AtomicBool,
    flushes: AtomicUsize,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_flushes(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Number of successful flushes so far.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.state).values.contains_key(key)
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_bool(&self, key: &str) -> bool {
        get_bool(&self.state, key)
    }

    fn set_bool(&self, key: &str, value: bool) {
        put(&self.state, key, StoredValue::Bool(value));
    }

    fn get_blob(&self, key: &str) -> Option<Vec<u8>> {
        get_blob(&self.state, key)
    }

    fn set_blob(&self, key: &str, value: Vec<u8>) {
        put(&self.state, key, StoredValue::Blob(value));
    }

    fn delete(&self, key: &str) {
        remove(&self.state, key);
    }

    fn flush(&self) -> Result<(), StoreError> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other(
                "key-value flush disabled",
            )));
        }
        lock(&self.state).dirty = false;
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
