//! # cardiorisk
//!
//! Cardiovascular risk assessment engine.
//!
//! Converts a small set of clinical risk factors into a heart-disease
//! probability by rebuilding, at inference time, the exact 25-slot feature
//! vector the model was trained on. The fitted preprocessor and the model
//! (architecture + weights) are fetched from a blob store once at start-up.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: record, feature schema, scaler, model, assessment result
//! - `ports`: traits for the blob store and the model runtime
//! - `adapters`: directory/SQLite blob stores, ZIP archive reader, log sanitizer
//! - `application`: artifact loading, inference engine, assessment service
//! - `config`: service configuration from the environment

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{Artifact, Artifacts, InferenceEngine, RiskAssessmentService};
pub use domain::{ClinicalRecord, FeatureVector, RiskAssessmentResult};

/// Result type for cardiorisk operations
pub type Result<T> = std::result::Result<T, CardioriskError>;

/// Per-request assessment failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssessmentError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Preprocessor unavailable: {0}")]
    PreprocessorUnavailable(String),

    #[error("Feature vector has {actual} slots, expected {expected}: {vector:?}")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
        vector: Vec<f64>,
    },

    #[error("Integrity fault: {0}")]
    Integrity(String),
}

/// Main error type for cardiorisk
#[derive(Debug, thiserror::Error)]
pub enum CardioriskError {
    #[error("Assessment failed: {0}")]
    Assessment(#[from] AssessmentError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] domain::ArtifactError),

    #[error("Blob store error: {0}")]
    Store(#[from] adapters::StoreError),

    #[error("Invalid clinical record: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
