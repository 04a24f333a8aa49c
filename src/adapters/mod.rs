//! Adapters layer: Concrete implementations of ports.
//!
//! - `directory`: blob store over a local directory
//! - `sqlite`: blob store in a SQLite database
//! - `archive`: ZIP model archive reader/writer
//! - `sanitize`: redaction of clinical values in logs

pub mod archive;
pub mod directory;
pub mod sanitize;
pub mod sqlite;

pub use directory::DirectoryBlobStore;
pub use sqlite::SqliteBlobStore;

/// Error type for blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob key: {0:?}")]
    InvalidKey(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}
