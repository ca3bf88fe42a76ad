use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::error::{StorageError, StorageResult};

const FALLBACK_DB_FILE: &str = "gymtrack.db";

/// Key under which the session record of a training is persisted
pub fn state_key(training_id: &str) -> String {
    format!("@training_state_{training_id}")
}

/// Key holding the indices of completed exercises of a training
pub fn completed_exercises_key(training_id: &str) -> String {
    format!("@training_completed_exercises_{training_id}")
}

/// Key holding the indices of skipped exercises of a training
pub fn skipped_exercises_key(training_id: &str) -> String {
    format!("@training_skipped_exercises_{training_id}")
}

/// Device-local string key-value storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Read and decode a JSON value; `Ok(None)` when the key is absent
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StorageError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()>
    where
        Self: Sized,
    {
        self.set(key, &encode_json(key, value)?)
    }

    /// Write several keys so that either all of them land or none do.
    ///
    /// Stores without native transactions get a compensating rollback: on the
    /// first failed write every key already written is put back to what it
    /// held before (or removed if it was absent).
    fn set_many(&self, entries: &[(String, String)]) -> StorageResult<()> {
        let mut previous = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            previous.push((key.as_str(), self.get(key)?));
        }

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(e) = self.set(key, value) {
                for (key, old) in previous.iter().take(written).rev() {
                    let restored = match old {
                        Some(old) => self.set(key, old),
                        None => self.remove(key),
                    };
                    if let Err(restore_err) = restored {
                        warn!(key, error = %restore_err, "failed to roll back partial write");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Serialize `value` for storage under `key`
pub fn encode_json<T: Serialize>(key: &str, value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn set_many(&self, entries: &[(String, String)]) -> StorageResult<()> {
        (**self).set_many(entries)
    }
}

/// SQLite-backed store, one row per key
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open the store at the default state directory location, or
    /// `gymtrack.db` in the working directory when there is no home
    pub fn open_default() -> StorageResult<Self> {
        let db_path = match AppDirs::db_path() {
            Some(path) => path,
            None => {
                let fallback = PathBuf::from(FALLBACK_DB_FILE);
                warn!(path = %fallback.display(), "no state directory available, using working directory");
                fallback
            }
        };
        Self::open(db_path)
    }

    /// Open (creating if needed) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(())
    }

    /// Location of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All keys with the given prefix, sorted
    pub fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;
        let rows = stmt.query_map([prefix], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        upsert(&self.conn, key, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    fn set_many(&self, entries: &[(String, String)]) -> StorageResult<()> {
        // dropping an uncommitted transaction rolls it back
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in entries {
            upsert(&tx, key, value)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        params![key, value, Utc::now().to_rfc3339()],
    )
}

/// Volatile store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn key_names_are_namespaced_by_training() {
        assert_eq!(state_key("42"), "@training_state_42");
        assert_eq!(
            completed_exercises_key("42"),
            "@training_completed_exercises_42"
        );
        assert_eq!(skipped_exercises_key("42"), "@training_skipped_exercises_42");
    }

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.len(), 1);

        store.remove("a").unwrap();
        assert!(store.is_empty());
        // removing a missing key is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn sqlite_store_overwrites_existing_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("k", "first").unwrap();
        store.set("k", "second").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("@training_state_7", "{}").unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("@training_state_7").unwrap().as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn keys_with_prefix_lists_matching_keys() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(&state_key("b"), "{}").unwrap();
        store.set(&state_key("a"), "{}").unwrap();
        store.set(&completed_exercises_key("a"), "[]").unwrap();

        let keys = store.keys_with_prefix("@training_state_").unwrap();
        assert_eq!(keys, vec!["@training_state_a", "@training_state_b"]);
    }

    #[test]
    fn json_helpers_roundtrip_and_report_decode_errors() {
        let store = MemoryStore::new();
        store.set_json("nums", &vec![1usize, 3, 5]).unwrap();
        let nums: Option<Vec<usize>> = store.get_json("nums").unwrap();
        assert_eq!(nums, Some(vec![1, 3, 5]));

        store.set("broken", "not json").unwrap();
        let err = store.get_json::<Vec<usize>>("broken").unwrap_err();
        assert!(matches!(err, StorageError::Decode { ref key, .. } if key == "broken"));

        let missing: Option<Vec<usize>> = store.get_json("missing").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn sqlite_set_many_writes_every_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("a", "old").unwrap();
        store
            .set_many(&[
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ])
            .unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn sqlite_set_many_rolls_back_when_a_write_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("a", "old").unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_b BEFORE INSERT ON kv WHEN NEW.key = 'b'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = store
            .set_many(&[
                ("a".to_string(), "new".to_string()),
                ("b".to_string(), "2".to_string()),
            ])
            .unwrap_err();
        assert!(matches!(err, StorageError::Sqlite(_)));
        assert_eq!(store.get("a").unwrap().as_deref(), Some("old"));
        assert_eq!(store.get("b").unwrap(), None);
    }
}
