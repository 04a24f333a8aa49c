//! Start-up artifact loading.
//!
//! Both artifacts are fetched and decoded exactly once, before the service
//! takes traffic. A failure never propagates: the artifact is recorded as
//! [`Artifact::Absent`] with its reason and the process keeps running in a
//! degraded state until restarted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::archive::read_model_archive;
use crate::config::ArtifactKeys;
use crate::domain::digest::{digests_match, sha256_hex, short};
use crate::domain::{ArtifactError, ModelArchitecture, ModelWeights, SequentialModel, StandardScaler};
use crate::ports::{BlobStore, Predictor};

/// A loaded artifact, or the reason it could not be loaded.
#[derive(Debug)]
pub enum Artifact<T: ?Sized> {
    Present(Arc<T>),
    Absent { reason: String },
}

impl<T: ?Sized> Clone for Artifact<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Present(inner) => Self::Present(Arc::clone(inner)),
            Self::Absent { reason } => Self::Absent {
                reason: reason.clone(),
            },
        }
    }
}

impl<T: ?Sized> Artifact<T> {
    /// Record an artifact as absent.
    pub fn absent(reason: impl Into<String>) -> Self {
        Self::Absent {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// The loaded value, if present.
    #[must_use]
    pub fn get(&self) -> Option<&Arc<T>> {
        match self {
            Self::Present(inner) => Some(inner),
            Self::Absent { .. } => None,
        }
    }

    /// Why the artifact is absent, if it is.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Present(_) => None,
            Self::Absent { reason } => Some(reason),
        }
    }
}

impl<T> Artifact<T> {
    fn from_result(result: Result<T, ArtifactError>) -> Self {
        match result {
            Ok(value) => Self::Present(Arc::new(value)),
            Err(e) => Self::absent(e.to_string()),
        }
    }
}

impl Artifact<SequentialModel> {
    /// Erase the concrete model type behind the predictor port.
    #[must_use]
    pub fn into_predictor(self) -> Artifact<dyn Predictor> {
        match self {
            Self::Present(model) => Artifact::Present(model as Arc<dyn Predictor>),
            Self::Absent { reason } => Artifact::Absent { reason },
        }
    }
}

/// Deserialize the fitted standardization transform.
///
/// Never fails: errors are captured as `Artifact::Absent`.
#[must_use]
pub fn load_preprocessor(blob: &[u8]) -> Artifact<StandardScaler> {
    let artifact = Artifact::from_result(StandardScaler::from_json_bytes(blob));
    match &artifact {
        Artifact::Present(scaler) => {
            tracing::info!("Loaded preprocessor ({} numeric features)", scaler.n_features());
        }
        Artifact::Absent { reason } => {
            tracing::error!("Preprocessor failed to load: {reason}");
        }
    }
    artifact
}

fn assemble_model(archive: &[u8]) -> Result<SequentialModel, ArtifactError> {
    let parts = read_model_archive(archive)?;
    let architecture = ModelArchitecture::from_json_bytes(&parts.descriptor)?;
    let weights = ModelWeights::from_bincode(&parts.weights)?;
    tracing::debug!(
        "Applying {} to {}",
        parts.weights_name,
        parts.descriptor_name
    );
    SequentialModel::assemble(architecture, weights)
}

/// Extract the descriptor and weights from a model archive and merge them
/// into one immutable model.
///
/// Never fails: errors are captured as `Artifact::Absent`.
#[must_use]
pub fn load_model(archive: &[u8]) -> Artifact<SequentialModel> {
    let artifact = Artifact::from_result(assemble_model(archive));
    match &artifact {
        Artifact::Present(model) => {
            tracing::info!("Loaded model {}", model.describe());
        }
        Artifact::Absent { reason } => {
            tracing::error!("Model failed to load: {reason}");
        }
    }
    artifact
}

/// Load-time facts about one artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactStatus {
    pub key: String,
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Status of both artifacts, as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactsReport {
    pub ready: bool,
    pub store: String,
    pub preprocessor: ArtifactStatus,
    pub model: ArtifactStatus,
}

struct Fetched {
    bytes: Option<Vec<u8>>,
    status: ArtifactStatus,
}

fn fetch_pinned<S: BlobStore + ?Sized>(store: &S, key: &str, pin: Option<&str>) -> Fetched {
    let mut status = ArtifactStatus {
        key: key.to_string(),
        present: false,
        sha256: None,
        size_bytes: None,
        reason: None,
        loaded_at: Utc::now(),
    };

    let bytes = match store.fetch(key) {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = ArtifactError::Fetch(format!("{key}: {e}"));
            tracing::error!("{err}");
            status.reason = Some(err.to_string());
            return Fetched {
                bytes: None,
                status,
            };
        }
    };

    let digest = sha256_hex(&bytes);
    status.size_bytes = Some(bytes.len());
    tracing::info!(
        "Fetched {key} from {} ({} bytes, sha256 {})",
        store.describe(),
        bytes.len(),
        short(&digest)
    );

    if let Some(expected) = pin {
        if !digests_match(expected, &digest) {
            let err = ArtifactError::DigestMismatch {
                expected: expected.trim().to_ascii_lowercase(),
                actual: digest.clone(),
            };
            tracing::error!("Refusing {key}: pinned digest does not match");
            status.sha256 = Some(digest);
            status.reason = Some(err.to_string());
            return Fetched {
                bytes: None,
                status,
            };
        }
    }

    status.sha256 = Some(digest);
    Fetched {
        bytes: Some(bytes),
        status,
    }
}

fn settle<T: ?Sized>(status: &mut ArtifactStatus, artifact: &Artifact<T>) {
    status.present = artifact.is_present();
    if let Some(reason) = artifact.reason() {
        status.reason.get_or_insert_with(|| reason.to_string());
    }
    status.loaded_at = Utc::now();
}

/// The immutable artifact bundle produced by the start-up phase.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub(crate) preprocessor: Artifact<StandardScaler>,
    pub(crate) model: Artifact<dyn Predictor>,
    report: ArtifactsReport,
}

impl Artifacts {
    /// Fetch, verify and decode both artifacts from `store`.
    ///
    /// Never fails; absent artifacts are reported through [`Artifacts::status`].
    pub fn load<S: BlobStore + ?Sized>(store: &S, keys: &ArtifactKeys) -> Self {
        tracing::info!("Loading artifacts from {}", store.describe());

        let fetched = fetch_pinned(
            store,
            &keys.preprocessor_key,
            keys.preprocessor_sha256.as_deref(),
        );
        let mut preprocessor_status = fetched.status;
        let preprocessor = match fetched.bytes {
            Some(bytes) => load_preprocessor(&bytes),
            None => Artifact::absent(preprocessor_status.reason.clone().unwrap_or_default()),
        };
        settle(&mut preprocessor_status, &preprocessor);

        let fetched = fetch_pinned(store, &keys.model_key, keys.model_sha256.as_deref());
        let mut model_status = fetched.status;
        let model = match fetched.bytes {
            Some(bytes) => load_model(&bytes).into_predictor(),
            None => Artifact::absent(model_status.reason.clone().unwrap_or_default()),
        };
        settle(&mut model_status, &model);

        let ready = preprocessor.is_present() && model.is_present();
        if ready {
            tracing::info!("Artifacts ready");
        } else {
            tracing::warn!("Starting in degraded mode: assessments will fail until restart");
        }

        Self {
            preprocessor,
            model,
            report: ArtifactsReport {
                ready,
                store: store.describe(),
                preprocessor: preprocessor_status,
                model: model_status,
            },
        }
    }

    /// Build a bundle from already-loaded parts.
    #[must_use]
    pub fn from_parts(
        preprocessor: Artifact<StandardScaler>,
        model: Artifact<dyn Predictor>,
    ) -> Self {
        let now = Utc::now();
        let status = |key: &str, present: bool, reason: Option<&str>| ArtifactStatus {
            key: key.to_string(),
            present,
            sha256: None,
            size_bytes: None,
            reason: reason.map(str::to_string),
            loaded_at: now,
        };
        let report = ArtifactsReport {
            ready: preprocessor.is_present() && model.is_present(),
            store: "in-process".to_string(),
            preprocessor: status(
                "preprocessor",
                preprocessor.is_present(),
                preprocessor.reason(),
            ),
            model: status("model", model.is_present(), model.reason()),
        };
        Self {
            preprocessor,
            model,
            report,
        }
    }

    /// Bundle with both artifacts present.
    #[must_use]
    pub fn new(scaler: StandardScaler, predictor: Arc<dyn Predictor>) -> Self {
        Self::from_parts(Artifact::Present(Arc::new(scaler)), Artifact::Present(predictor))
    }

    #[must_use]
    pub fn preprocessor(&self) -> &Artifact<StandardScaler> {
        &self.preprocessor
    }

    #[must_use]
    pub fn model(&self) -> &Artifact<dyn Predictor> {
        &self.model
    }

    /// Load-time status of both artifacts.
    #[must_use]
    pub fn status(&self) -> &ArtifactsReport {
        &self.report
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.report.ready
    }
}
