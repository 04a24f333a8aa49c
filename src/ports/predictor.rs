//! Predictor port: a fitted model's forward pass.
//!
//! The inference engine only depends on this trait, so a fixed-output model
//! can stand in for the archive-loaded network.

use crate::domain::{ArtifactError, SequentialModel};

/// Single-row probability model.
pub trait Predictor: Send + Sync {
    /// Run the forward pass on one feature row and return the positive-class
    /// probability.
    ///
    /// # Errors
    /// Returns `ArtifactError::ShapeMismatch` if the row width is wrong.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ArtifactError>;

    /// Short description for logs and status output.
    fn describe(&self) -> String;
}

impl std::fmt::Debug for dyn Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predictor({})", self.describe())
    }
}

impl Predictor for SequentialModel {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ArtifactError> {
        self.forward(features)
    }

    fn describe(&self) -> String {
        format!(
            "{} ({} layers, {} parameters)",
            self.name().unwrap_or("sequential"),
            self.depth(),
            self.parameter_count()
        )
    }
}
