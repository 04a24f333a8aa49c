//! SQLite adapter: BlobStore backed by a single-table database.
//!
//! Artifacts are written once by the `put` tooling and read at service
//! start-up. Each row records the SHA-256 of its payload at write time.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex surfaces as
//! `StoreError::LockPoisoned` instead of a panic.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::adapters::StoreError;
use crate::domain::digest::sha256_hex;
use crate::ports::BlobStore;

/// Metadata of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: String,
    pub size: usize,
    pub sha256: String,
    pub created_at: String,
}

/// SQLite storage adapter.
pub struct SqliteBlobStore {
    conn: Mutex<Connection>,
    label: String,
}

impl SqliteBlobStore {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let label = format!("sqlite:{}", path.as_ref().display());
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            label,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            label: "sqlite::memory:".to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                sha256 TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Store `data` under `key`, replacing any previous blob.
    ///
    /// Returns the SHA-256 digest of the stored payload.
    ///
    /// # Errors
    /// Returns error if the key is empty or the write fails.
    pub fn put(&self, key: &str, data: &[u8]) -> Result<String, StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let digest = sha256_hex(data);
        let now = chrono::Utc::now().to_rfc3339();

        let conn = self.lock()?;
        conn.execute(
            r"
            INSERT OR REPLACE INTO blobs (key, data, sha256, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![key, data, digest, now],
        )?;

        tracing::info!("Stored blob {key} ({} bytes)", data.len());
        Ok(digest)
    }

    /// List stored blobs, ordered by key.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn list(&self) -> Result<Vec<BlobInfo>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, length(data), sha256, created_at FROM blobs ORDER BY key",
        )?;
        let rows = stmt.query_map([], |row| {
            let size: i64 = row.get(1)?;
            Ok(BlobInfo {
                key: row.get(0)?,
                size: usize::try_from(size).unwrap_or(0),
                sha256: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Delete a blob. Missing keys are not an error.
    ///
    /// # Errors
    /// Returns error if the delete fails.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl BlobStore for SqliteBlobStore {
    type Error = StoreError;

    fn fetch(&self, key: &str) -> Result<Vec<u8>, Self::Error> {
        let conn = self.lock()?;
        let data: Option<Vec<u8>> = conn
            .query_row(
                "SELECT data FROM blobs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        data.ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn contains(&self, key: &str) -> Result<bool, Self::Error> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM blobs WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_crud() {
        let store = SqliteBlobStore::in_memory().expect("Should create db");

        assert!(!store.contains("model.zip").expect("Should check"));
        let digest = store.put("model.zip", b"archive").expect("Should put");
        assert_eq!(digest, sha256_hex(b"archive"));
        assert!(store.contains("model.zip").expect("Should check"));
        assert_eq!(store.fetch("model.zip").expect("Should fetch"), b"archive");

        // Replace
        store.put("model.zip", b"archive-v2").expect("Should put");
        assert_eq!(store.fetch("model.zip").expect("Should fetch"), b"archive-v2");

        store.delete("model.zip").expect("Should delete");
        assert!(matches!(
            store.fetch("model.zip"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list() {
        let store = SqliteBlobStore::in_memory().expect("Should create db");
        store.put("b", b"22").expect("put");
        store.put("a", b"1").expect("put");

        let listed = store.list().expect("Should list");
        let keys: Vec<_> = listed.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(listed[1].size, 2);
        assert_eq!(listed[0].sha256, sha256_hex(b"1"));
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = SqliteBlobStore::in_memory().expect("Should create db");
        assert!(matches!(store.put(" ", b"x"), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_persists_on_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("artifacts.db");
        {
            let store = SqliteBlobStore::new(&path).expect("open");
            store.put("preprocessor.json", b"{}").expect("put");
        }
        let store = SqliteBlobStore::new(&path).expect("reopen");
        assert_eq!(store.fetch("preprocessor.json").expect("fetch"), b"{}");
        assert!(store.describe().starts_with("sqlite:"));
    }
}
