//! Application layer: artifact loading and the assessment use case.
//!
//! This module wires the domain transform to the ports: artifacts are fetched
//! from a `BlobStore` once, then every assessment runs against the frozen
//! bundle.

pub mod artifacts;
mod engine;
mod service;

pub use artifacts::{load_model, load_preprocessor, Artifact, ArtifactStatus, Artifacts, ArtifactsReport};
pub use engine::InferenceEngine;
pub use service::RiskAssessmentService;
