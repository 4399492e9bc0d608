//! File-based store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::store::KvStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const ENTRY_EXTENSION: &str = "json";

/// On-disk envelope. The key is kept alongside the value so the
/// directory can be enumerated without reversing file names.
#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: String,
}

/// A directory-backed key-value store.
///
/// Each key lives in its own file named after the hex SHA-256 of the key,
/// so arbitrary key strings never reach the file system as paths.
///
/// # Durability
///
/// - `put` writes to a temporary sibling, syncs it, then renames it over
///   the entry, so readers see either the old or the new value
/// - `delete` removes the entry file
///
/// # Example
///
/// ```no_run
/// use mediasync_storage::{KvStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("data")).unwrap();
/// store.put("filmin_catalog_paid", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let mut name = String::with_capacity(digest.len() * 2 + 5);
        for byte in digest.iter() {
            // Writing to a String cannot fail
            let _ = write!(name, "{byte:02x}");
        }
        name.push('.');
        name.push_str(ENTRY_EXTENSION);
        self.root.join(name)
    }

    fn read_entry(path: &Path) -> StorageResult<Option<Entry>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupted(format!("{}: {e}", path.display())))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.entry_path(key);
        match Self::read_entry(&path)? {
            Some(entry) if entry.key == key => Ok(Some(entry.value)),
            Some(entry) => Err(StorageError::Corrupted(format!(
                "{} holds key {:?}, expected {:?}",
                path.display(),
                entry.key,
                key
            ))),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.entry_path(key);
        let entry = Entry {
            key: key.to_string(),
            value: value.to_string(),
        };
        let encoded = serde_json::to_vec(&entry)?;

        let seq = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{ENTRY_EXTENSION}.tmp-{seq}"));
        fs::write(&tmp, &encoded)?;
        fs::File::open(&tmp)?.sync_all()?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(key, bytes = encoded.len(), "stored entry");
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => {
                tracing::debug!(key, "deleted entry");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for dir_entry in fs::read_dir(&self.root)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(entry) = Self::read_entry(&path)? {
                keys.push(entry.key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("data");
        let store = FileStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn file_get_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("filmin_a").unwrap(), None);
    }

    #[test]
    fn file_put_and_get() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put("filmin_a", r#"[{"url":"u"}]"#).unwrap();
        store.put("filmin_a", "[]").unwrap();
        assert_eq!(store.get("filmin_a").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn file_keys_with_path_characters_are_safe() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put("../../etc/passwd", "[]").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["../../etc/passwd"]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put("filmin_b", "[1]").unwrap();
            store.put("filmin_a", "[2]").unwrap();
        }

        {
            let store = FileStore::open(dir.path()).unwrap();
            assert_eq!(store.keys().unwrap(), vec!["filmin_a", "filmin_b"]);
            assert_eq!(store.get("filmin_b").unwrap().as_deref(), Some("[1]"));
        }
    }

    #[test]
    fn file_delete() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put("filmin_a", "[]").unwrap();
        store.delete("filmin_a").unwrap();
        assert_eq!(store.get("filmin_a").unwrap(), None);
        assert!(store.delete("filmin_a").is_ok());
    }

    #[test]
    fn file_corrupted_entry_is_reported() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put("filmin_a", "[]").unwrap();
        let path = store.entry_path("filmin_a");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            store.get("filmin_a"),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn file_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("README.txt"), b"hello").unwrap();
        store.put("filmin_a", "[]").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["filmin_a"]);
    }
}
