//! Filesystem-backed store: one file per key under the data directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{PersistentStore, StoreError};

/// Durable store writing each entry to `<data_dir>/<key>.json`.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves either the old value or the new one - never a
/// torn entry.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        // Keys are dotted identifiers chosen by this crate; anything that
        // could escape the data dir is rejected outright.
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        write_atomic(&path, value)?;
        debug!(key, bytes = value.len(), "store entry written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// Write `value` to `path` via a temp file in the same directory plus rename.
fn write_atomic(path: &Path, value: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");

        assert!(store.get("pos.cart").expect("get").is_none());

        store.put("pos.cart", "{\"items\":[]}").expect("put");
        assert_eq!(
            store.get("pos.cart").expect("get").as_deref(),
            Some("{\"items\":[]}")
        );

        store.remove("pos.cart").expect("remove");
        assert!(store.get("pos.cart").expect("get").is_none());

        // Removing again is a no-op.
        store.remove("pos.cart").expect("remove twice");
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = FileStore::open(dir.path()).expect("open");
            store.put("auth.tokens", "pair").expect("put");
        }
        let store = FileStore::open(dir.path()).expect("reopen");
        assert_eq!(
            store.get("auth.tokens").expect("get").as_deref(),
            Some("pair")
        );
    }

    #[test]
    fn test_put_replaces_whole_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");

        store.put("pos.cart", "a long first value").expect("put");
        store.put("pos.cart", "short").expect("put");
        assert_eq!(store.get("pos.cart").expect("get").as_deref(), Some("short"));
    }

    #[test]
    fn test_rejects_path_escape_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");

        assert!(matches!(
            store.put("../outside", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StoreError::InvalidKey(_))));
    }
}
