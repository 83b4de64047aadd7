use std::fs;
use std::path::PathBuf;

use super::KvStore;
use crate::error::StorageError;

/// One JSON file per key under a base directory
#[derive(Clone, Debug)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a file store with the default base directory ("./wallet-data")
    pub fn new() -> Self {
        Self {
            base_path: PathBuf::from("./wallet-data"),
        }
    }

    /// Create a file store with a custom base directory
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_path
    }

    /// Keys are dotted identifiers; anything outside [A-Za-z0-9._-] is replaced
    /// so a key can never escape the base directory.
    fn key_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{}.json", file_name.trim_start_matches('.')))
    }

    /// List keys currently on disk
    pub fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_path)?;
        let path = self.key_path(key);

        // stored pretty-printed
        let pretty = match serde_json::from_str::<serde_json::Value>(value) {
            Ok(json) => serde_json::to_string_pretty(&json)?,
            Err(_) => value.to_string(),
        };

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, pretty)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key);
        if path.exists() {
            log::debug!("Deleting storage file {:?}", path);
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{ActiveMintUrl, Mints};
    use crate::storage::{SchemaKey, TypedStore};
    use tempfile::TempDir;

    #[test]
    fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(dir.path().join("data"));

        assert!(store.get_raw("cashu.mints").unwrap().is_none());

        store.put::<ActiveMintUrl>(&Some("http://localhost:3338".to_string())).unwrap();
        assert_eq!(
            store.get::<ActiveMintUrl>().unwrap().as_deref(),
            Some("http://localhost:3338")
        );
        assert_eq!(store.list_keys().unwrap(), vec![ActiveMintUrl::KEY.to_string()]);

        store.delete(ActiveMintUrl::KEY).unwrap();
        assert!(store.try_get::<ActiveMintUrl>().unwrap().is_none());
        // deleting twice is fine
        store.delete(ActiveMintUrl::KEY).unwrap();
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::new_with_base_dir(dir.path().to_path_buf());
            store.put::<Mints>(&Vec::new()).unwrap();
        }
        let store = FileStore::new_with_base_dir(dir.path().to_path_buf());
        assert!(store.get::<Mints>().unwrap().is_empty());
    }

    #[test]
    fn test_key_cannot_escape_base_dir() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(dir.path().to_path_buf());
        let path = store.key_path("../../etc/passwd");
        assert!(path.starts_with(dir.path()));
    }
}
