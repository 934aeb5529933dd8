//! Directory-backed snapshot store
//!
//! Each storage key maps to one JSON file. Writes go through a temporary file
//! and a rename so a crash never leaves a half-written snapshot behind.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use shared::{StagingStore, StoreError};

#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// File holding the snapshot for `key`
    ///
    /// Bytes outside `[A-Za-z0-9-_.]` are written as `%XX`, so distinct keys
    /// never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut file_name = String::with_capacity(key.len());
        for byte in key.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                    file_name.push(char::from(byte))
                }
                _ => file_name.push_str(&format!("%{:02X}", byte)),
            }
        }
        self.directory.join(format!("{}.json", file_name))
    }
}

impl StagingStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        if let Err(e) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_keys_stay_inside_directory(key in ".{0,40}") {
            let store = FileStore::new("/tmp/staging");
            let path = store.path_for(&key);
            prop_assert_eq!(path.parent(), Some(std::path::Path::new("/tmp/staging")));
            let name = path.file_name().and_then(|n| n.to_str()).unwrap();
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || "-_.%".contains(c)));
        }
    }

    #[test]
    fn test_missing_key_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.read("inventory-staging:a:b").unwrap(), None);
    }

    #[test]
    fn test_write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested"));

        store.write("inventory-staging:a:b", "{\"entries\":[]}").unwrap();
        assert_eq!(
            store.read("inventory-staging:a:b").unwrap().as_deref(),
            Some("{\"entries\":[]}")
        );

        store.remove("inventory-staging:a:b").unwrap();
        assert_eq!(store.read("inventory-staging:a:b").unwrap(), None);
        // Removing twice is fine
        store.remove("inventory-staging:a:b").unwrap();
    }

    #[test]
    fn test_keys_map_to_safe_file_names() {
        let store = FileStore::new("/tmp/staging");
        let path = store.path_for("inventory-staging:inst/1:prod 2");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("inventory-staging%3Ainst%2F1%3Aprod%202.json")
        );
    }

    #[test]
    fn test_similar_keys_use_separate_files() {
        let store = FileStore::new("/tmp/staging");
        assert_ne!(
            store.path_for("inventory-staging:home:flour 1"),
            store.path_for("inventory-staging:home:flour_1")
        );
        assert_ne!(store.path_for("a%20b"), store.path_for("a b"));
    }

    #[test]
    fn test_failed_rename_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        // A non-empty directory where the snapshot should go blocks the rename
        let target = store.path_for("k");
        fs::create_dir_all(target.join("occupied")).unwrap();

        assert!(store.write("k", "{\"entries\":[]}").is_err());
        assert!(!target.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        store.write("k", "one").unwrap();
        store.write("k", "two").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("two"));
        assert!(!store.path_for("k").with_extension("json.tmp").exists());
    }
}
