//! Service configuration.
//!
//! Settings come from `CARDIORISK_*` environment variables; the CLI layers
//! its flags on top. The decision threshold is not configurable.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::adapters::{DirectoryBlobStore, SqliteBlobStore, StoreError};
use crate::ports::BlobStore;
use crate::CardioriskError;

pub const ENV_ARTIFACT_DIR: &str = "CARDIORISK_ARTIFACT_DIR";
pub const ENV_ARTIFACT_DB: &str = "CARDIORISK_ARTIFACT_DB";
pub const ENV_PREPROCESSOR_KEY: &str = "CARDIORISK_PREPROCESSOR_KEY";
pub const ENV_MODEL_KEY: &str = "CARDIORISK_MODEL_KEY";
pub const ENV_PREPROCESSOR_SHA256: &str = "CARDIORISK_PREPROCESSOR_SHA256";
pub const ENV_MODEL_SHA256: &str = "CARDIORISK_MODEL_SHA256";

pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
pub const DEFAULT_PREPROCESSOR_KEY: &str = "preprocessor.json";
pub const DEFAULT_MODEL_KEY: &str = "model.zip";

/// Where start-up artifacts are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "path")]
pub enum StoreLocation {
    Directory(PathBuf),
    Sqlite(PathBuf),
}

impl Default for StoreLocation {
    fn default() -> Self {
        Self::Directory(PathBuf::from(DEFAULT_ARTIFACT_DIR))
    }
}

/// Blob keys of the two artifacts, with optional pinned digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactKeys {
    pub preprocessor_key: String,
    pub model_key: String,
    pub preprocessor_sha256: Option<String>,
    pub model_sha256: Option<String>,
}

impl Default for ArtifactKeys {
    fn default() -> Self {
        Self {
            preprocessor_key: DEFAULT_PREPROCESSOR_KEY.to_string(),
            model_key: DEFAULT_MODEL_KEY.to_string(),
            preprocessor_sha256: None,
            model_sha256: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub store: StoreLocation,
    #[serde(flatten)]
    pub keys: ArtifactKeys,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// See [`ServiceConfig::from_lookup`].
    pub fn from_env() -> Result<Self, CardioriskError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup` (environment-style names).
    ///
    /// # Errors
    /// Returns `CardioriskError::Config` if both store locations are set or a
    /// pinned digest is not 64 hex characters.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CardioriskError> {
        let dir = non_empty(lookup(ENV_ARTIFACT_DIR));
        let db = non_empty(lookup(ENV_ARTIFACT_DB));

        let store = match (dir, db) {
            (Some(_), Some(_)) => {
                return Err(CardioriskError::Config(format!(
                    "{ENV_ARTIFACT_DIR} and {ENV_ARTIFACT_DB} are mutually exclusive"
                )));
            }
            (Some(dir), None) => StoreLocation::Directory(PathBuf::from(dir)),
            (None, Some(db)) => StoreLocation::Sqlite(PathBuf::from(db)),
            (None, None) => StoreLocation::default(),
        };

        let defaults = ArtifactKeys::default();
        let config = Self {
            store,
            keys: ArtifactKeys {
                preprocessor_key: non_empty(lookup(ENV_PREPROCESSOR_KEY))
                    .unwrap_or(defaults.preprocessor_key),
                model_key: non_empty(lookup(ENV_MODEL_KEY)).unwrap_or(defaults.model_key),
                preprocessor_sha256: non_empty(lookup(ENV_PREPROCESSOR_SHA256)),
                model_sha256: non_empty(lookup(ENV_MODEL_SHA256)),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check pinned digests are well-formed.
    ///
    /// # Errors
    /// Returns `CardioriskError::Config` naming the offending setting.
    pub fn validate(&self) -> Result<(), CardioriskError> {
        let pins = [
            (ENV_PREPROCESSOR_SHA256, &self.keys.preprocessor_sha256),
            (ENV_MODEL_SHA256, &self.keys.model_sha256),
        ];
        for (name, pin) in pins {
            if let Some(pin) = pin {
                if !is_sha256_hex(pin.trim()) {
                    return Err(CardioriskError::Config(format!(
                        "{name} must be 64 hex characters"
                    )));
                }
            }
        }
        if self.keys.preprocessor_key.trim().is_empty() || self.keys.model_key.trim().is_empty() {
            return Err(CardioriskError::Config("artifact keys must not be empty".into()));
        }
        Ok(())
    }

    /// Open the configured blob store.
    ///
    /// # Errors
    /// Returns the store's error if the directory or database cannot be opened.
    pub fn open_store(&self) -> Result<Box<dyn BlobStore<Error = StoreError>>, StoreError> {
        let store: Box<dyn BlobStore<Error = StoreError>> = match &self.store {
            StoreLocation::Directory(path) => Box::new(DirectoryBlobStore::new(path)?),
            StoreLocation::Sqlite(path) => Box::new(SqliteBlobStore::new(path)?),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.keys.model_key, "model.zip");
        assert_eq!(config.keys.preprocessor_key, "preprocessor.json");
    }

    #[test]
    fn test_sqlite_location_and_pins() {
        let pin = "AB".repeat(32);
        let config = ServiceConfig::from_lookup(lookup(&[
            (ENV_ARTIFACT_DB, "/var/lib/cardiorisk/artifacts.db"),
            (ENV_MODEL_KEY, "heart/model-v3.zip"),
            (ENV_MODEL_SHA256, pin.as_str()),
            (ENV_PREPROCESSOR_SHA256, "  "),
        ]))
        .expect("config");

        assert_eq!(
            config.store,
            StoreLocation::Sqlite(PathBuf::from("/var/lib/cardiorisk/artifacts.db"))
        );
        assert_eq!(config.keys.model_key, "heart/model-v3.zip");
        assert_eq!(config.keys.model_sha256.as_deref(), Some(pin.as_str()));
        assert!(config.keys.preprocessor_sha256.is_none());
    }

    #[test]
    fn test_conflicting_locations() {
        let err = ServiceConfig::from_lookup(lookup(&[
            (ENV_ARTIFACT_DIR, "/srv/artifacts"),
            (ENV_ARTIFACT_DB, "/srv/artifacts.db"),
        ]))
        .expect_err("must fail");
        assert!(matches!(err, CardioriskError::Config(_)));
    }

    #[test]
    fn test_malformed_pin() {
        let err = ServiceConfig::from_lookup(lookup(&[(ENV_MODEL_SHA256, "deadbeef")]))
            .expect_err("must fail");
        assert!(err.to_string().contains(ENV_MODEL_SHA256));
    }

    #[test]
    fn test_open_directory_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("model.zip"), b"zip").expect("write");

        let config = ServiceConfig {
            store: StoreLocation::Directory(temp.path().to_path_buf()),
            keys: ArtifactKeys::default(),
        };
        let store = config.open_store().expect("open");
        assert_eq!(store.fetch("model.zip").expect("fetch"), b"zip");
    }

    #[test]
    fn test_deserialize() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{"store": {"kind": "sqlite", "path": "a.db"}, "model_key": "m.zip"}"#,
        )
        .expect("parse");
        assert_eq!(config.store, StoreLocation::Sqlite(PathBuf::from("a.db")));
        assert_eq!(config.keys.model_key, "m.zip");
        assert_eq!(config.keys.preprocessor_key, "preprocessor.json");
    }
}
