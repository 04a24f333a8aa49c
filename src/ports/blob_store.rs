//! Blob store port: key to bytes lookup for start-up artifacts.
//!
//! This trait abstracts the artifact store (directory, SQLite) from the
//! artifact loader. The core treats it as an opaque lookup; nothing is
//! fetched after start-up.

/// Read access to opaque binary blobs.
pub trait BlobStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the blob stored under `key`.
    ///
    /// # Errors
    /// Returns error if the key is unknown or the backend fails.
    fn fetch(&self, key: &str) -> Result<Vec<u8>, Self::Error>;

    /// Check whether a blob exists under `key`.
    ///
    /// # Errors
    /// Returns error if the backend fails.
    fn contains(&self, key: &str) -> Result<bool, Self::Error>;

    /// Human-readable location of the store, for logs.
    fn describe(&self) -> String;
}
