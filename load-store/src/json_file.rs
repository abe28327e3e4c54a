use crate::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A single JSON document on disk, replaced atomically on every write.
pub(crate) struct JsonFile<V> {
    path: PathBuf,
    _phantom: PhantomData<fn() -> V>,
}

impl<V: DeserializeOwned> JsonFile<V> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the document. Returns None if the file does not exist.
    pub fn read(&self) -> Result<Option<V>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_slice(&bytes)?;
        Ok(Some(value))
    }

    /// Encode `value` and atomically replace the file with it. Takes any
    /// borrowed form of the document, so a `Vec<T>` file accepts `&[T]`.
    pub fn write<S: Serialize + ?Sized>(&self, value: &S) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value)?;
        write_atomic(&self.path, &json)
    }

    /// Delete the file. A missing file is not an error. Returns whether a
    /// file was removed.
    pub fn remove(&self) -> Result<bool, StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Size of the file in bytes. Returns None if the file does not exist.
    pub fn size_bytes(&self) -> Result<Option<u64>, StoreError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `bytes` to a temp file next to `path`, sync it, then rename it over
/// `path`. Readers see either the old contents or the new, never a partial file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| StoreError::Persist {
        path: path.to_path_buf(),
        source: err.error,
    })?;

    #[cfg(unix)]
    {
        // The rename has already happened; sync failures are logged only.
        match std::fs::File::open(dir) {
            Ok(handle) => {
                if let Err(e) = handle.sync_all() {
                    tracing::warn!(dir = %dir.display(), error = %e, "Failed to sync directory");
                }
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to open directory for sync");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_in(dir: &TempDir) -> JsonFile<Vec<u32>> {
        JsonFile::new(dir.path().join("values.json"))
    }

    #[test]
    fn test_read_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_in(&dir).read().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir);
        file.write(&vec![3, 1, 2]).unwrap();
        assert_eq!(file.read().unwrap(), Some(vec![3, 1, 2]));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("a/b/v.json"));
        file.write(&vec![1]).unwrap();
        assert!(file.path().exists());
    }

    #[test]
    fn test_write_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir);
        file.write(&vec![1, 2, 3, 4, 5]).unwrap();
        file.write(&vec![9]).unwrap();
        assert_eq!(file.read().unwrap(), Some(vec![9]));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("values.json")]);
    }

    #[test]
    fn test_read_corrupt_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir);
        std::fs::write(file.path(), b"[1, 2,").unwrap();
        assert!(matches!(file.read(), Err(StoreError::Json(_))));
    }

    #[test]
    fn test_write_onto_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir);
        std::fs::create_dir_all(file.path().join("occupied")).unwrap();
        assert!(matches!(
            file.write(&vec![1]),
            Err(StoreError::Persist { .. })
        ));
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir);
        assert!(!file.remove().unwrap());
        file.write(&vec![1]).unwrap();
        assert!(file.remove().unwrap());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_size_bytes_matches_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir);
        assert_eq!(file.size_bytes().unwrap(), None);
        file.write(&vec![10, 20]).unwrap();
        let expected = std::fs::metadata(file.path()).unwrap().len();
        assert_eq!(file.size_bytes().unwrap(), Some(expected));
    }
}
