//! Work list persistence: load, atomic save, transactional update.
//!
//! The store file is the only shared mutable resource, so every mutation goes
//! through [`Store::update`]: load, apply a closure, write back atomically,
//! all under an exclusive advisory lock. A crash mid-write can never leave a
//! syntactically invalid file because the write lands in a temp file that is
//! renamed over the original.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fs2::FileExt;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::item::WorkList;

/// Store file name at the project root.
pub const STORE_FILE: &str = "work_list.json";

const WORK_LIST_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/work_list.schema.json"
));

static SCHEMA_VALIDATOR: LazyLock<jsonschema::Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(WORK_LIST_SCHEMA).expect("embedded schema should be valid JSON");
    jsonschema::validator_for(&schema).expect("embedded schema should compile")
});

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("work list not found at {path}")]
    NotFound { path: PathBuf },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed work list {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("work list {path} does not match schema:\n- {}", messages.join("\n- "))]
    Schema { path: PathBuf, messages: Vec<String> },
}

/// Handle on the persisted collection.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store handle for a project root (`<root>/work_list.json`).
    pub fn for_root(root: &Path) -> Self {
        Self::new(root.join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Parse the store file. A failed load never mutates anything: the
    /// previous good state on disk is untouched.
    pub fn load(&self) -> Result<WorkList, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let value: Value = serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let messages: Vec<String> = SCHEMA_VALIDATOR
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            return Err(StoreError::Schema {
                path: self.path.clone(),
                messages,
            });
        }

        serde_json::from_value(value).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the whole file atomically (temp file + rename).
    pub fn save(&self, list: &WorkList) -> Result<(), StoreError> {
        let mut buf = serde_json::to_string_pretty(list).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        buf.push('\n');

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &buf).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "work list written");
        Ok(())
    }

    /// Transactional read-modify-write under an exclusive advisory lock.
    ///
    /// The closure's return value is passed through after the write lands.
    pub fn update<T>(&self, mutate: impl FnOnce(&mut WorkList) -> T) -> Result<T, StoreError> {
        let _guard = StoreLock::acquire(&self.lock_path())?;
        let mut list = self.load()?;
        let result = mutate(&mut list);
        self.save(&list)?;
        Ok(result)
    }
}

/// RAII guard around the store's advisory lock file.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{item, list_of};

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Store::for_root(temp.path());
        let list = list_of(vec![item("a", 1), item("b", 2)]);

        store.save(&list).expect("save");
        let loaded = store.load().expect("load");
        assert_eq!(loaded, list);
    }

    #[test]
    fn load_reports_missing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Store::for_root(temp.path());
        assert!(matches!(store.load(), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn load_reports_malformed_json_without_touching_the_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Store::for_root(temp.path());
        fs::write(store.path(), "{ not json").expect("write");

        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
        let on_disk = fs::read_to_string(store.path()).expect("read");
        assert_eq!(on_disk, "{ not json");
    }

    #[test]
    fn load_reports_schema_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Store::for_root(temp.path());
        fs::write(store.path(), r#"{"items": [{"id": 42}]}"#).expect("write");

        match store.load() {
            Err(StoreError::Schema { messages, .. }) => {
                assert!(!messages.is_empty());
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn update_applies_mutation_and_persists() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Store::for_root(temp.path());
        store.save(&list_of(vec![item("a", 1)])).expect("seed");

        let flipped = store
            .update(|list| {
                let item = list.get_mut("a").expect("item");
                item.passes = true;
                list.items.len()
            })
            .expect("update");
        assert_eq!(flipped, 1);

        let loaded = store.load().expect("load");
        assert!(loaded.items[0].passes);
    }

    #[test]
    fn saved_file_ends_with_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Store::for_root(temp.path());
        store.save(&list_of(vec![item("a", 1)])).expect("save");
        let contents = fs::read_to_string(store.path()).expect("read");
        assert!(contents.ends_with('\n'));
    }
}
