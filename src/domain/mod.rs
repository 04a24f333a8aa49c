//! Domain layer: clinical record, feature schema and fitted artifacts.
//!
//! Everything here is pure: no I/O, no logging, no shared state.

mod assessment;
pub mod digest;
pub mod features;
mod model;
mod preprocessor;
mod record;

pub use assessment::{RiskAssessmentResult, DECISION_THRESHOLD};
pub use features::{build_feature_vector, oldpeak_bin, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use model::{
    Activation, DenseLayerSpec, LayerWeights, ModelArchitecture, ModelWeights, SequentialModel,
};
pub use preprocessor::StandardScaler;
pub use record::{ClinicalRecord, RECORD_FIELDS};

#[cfg(test)]
pub(crate) use model::logistic_fixture;
#[cfg(test)]
pub(crate) use preprocessor::identity_scaler;
#[cfg(test)]
pub(crate) use record::reference_record;

/// Errors raised while decoding or validating an artifact.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArtifactError {
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    #[error("Invalid preprocessor: {0}")]
    InvalidPreprocessor(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Archive is missing a {0}")]
    MissingEntry(&'static str),

    #[error("Archive has more than one {kind}: {entries:?}")]
    AmbiguousEntry {
        kind: &'static str,
        entries: Vec<String>,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Blob unavailable: {0}")]
    Fetch(String),
}
