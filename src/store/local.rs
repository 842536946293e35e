//! Per-server filesystem storage.
//!
//! Keys are slash-separated logical paths joined onto a base directory. Writes
//! go to a temporary sibling file first and are renamed over the target, so a
//! reader never observes a half-written blob; a per-key lock serializes
//! concurrent writers of the same key while distinct keys proceed in parallel.

use super::error::StoreError;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct LocalStorage {
    base_path: PathBuf,
    path_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl LocalStorage {
    /// Opens (and creates, if needed) a storage root at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            path_locks: DashMap::new(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Stores a blob under `key`, creating parent directories as needed.
    ///
    /// With `overwrite` unset, an existing key fails with `AlreadyExists`.
    /// The write is temp-file-then-rename, so concurrent readers see either
    /// the old blob or the new one, never a mix.
    pub fn put(&self, key: &str, data: &[u8], overwrite: bool) -> Result<(), StoreError> {
        let file_path = self.base_path.join(key);
        let lock = self
            .path_locks
            .entry(file_path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().unwrap();

        if !overwrite && file_path.exists() {
            return Err(StoreError::AlreadyExists {
                path: file_path.display().to_string(),
            });
        }

        let parent = file_path.parent().expect("object path has a parent");
        fs::create_dir_all(parent)?;

        let temp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let result = fs::write(&temp_path, data).and_then(|_| fs::rename(&temp_path, &file_path));
        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Returns the blob stored under `key`, or `NotFound`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.base_path.join(key);
        if !path.exists() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(fs::read(path)?)
    }

    /// Deletes the blob under `key` if it exists. Absent keys are not an error.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.base_path.join(key);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the keys of all regular files whose full path starts with
    /// `base/prefix`. The match is a plain string prefix, not a path-component
    /// boundary, so `customer-` matches `customer-CUST0001`.
    ///
    /// A prefix naming a directory that does not exist yet is created, and the
    /// listing proceeds (typically returning empty for a fresh directory).
    pub fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let prefix_path = if prefix.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(prefix)
        };
        if !prefix_path.exists() {
            fs::create_dir_all(&prefix_path)?;
        }
        tracing::debug!(
            "Listing objects with prefix: {}, prefix path: {}",
            prefix,
            prefix_path.display()
        );

        let prefix_str = prefix_path.display().to_string();
        let mut result = Vec::new();
        self.walk(&self.base_path, &mut |path: &Path| {
            if path == prefix_path.as_path() {
                return Ok(());
            }
            if path.display().to_string().starts_with(&prefix_str) {
                result.push(self.relative_key(path));
            }
            Ok(())
        })?;
        tracing::debug!("Found {} objects under prefix {}", result.len(), prefix);
        Ok(result)
    }

    fn walk(
        &self,
        dir: &Path,
        visit: &mut impl FnMut(&Path) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.walk(&path, visit)?;
            } else if file_type.is_file() {
                visit(&path)?;
            }
        }
        Ok(())
    }

    fn relative_key(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_path)
            .expect("walked path is under the base path")
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_table_is_bounded_by_key_set() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        for _ in 0..3 {
            storage.put("a/key", b"data", true).unwrap();
            storage.put("b/key", b"data", true).unwrap();
        }

        // Locks are created lazily per key and never removed.
        assert_eq!(storage.path_locks.len(), 2);
    }

    #[test]
    fn test_atomic_put_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        storage.put("table/data/file", b"contents", false).unwrap();

        let listed = storage.list_objects("").unwrap();
        assert_eq!(listed, vec!["table/data/file".to_string()]);
    }
}
