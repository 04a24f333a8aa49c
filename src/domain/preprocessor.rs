//! Fitted standardization transform for the numeric feature block.
//!
//! The statistics are fit once at training time and shipped as a JSON blob.
//! They are reused verbatim for every request; a request row is never used to
//! re-fit mean or scale.

use serde::{Deserialize, Serialize};

use super::features::{NUMERIC_FEATURE_NAMES, NUMERIC_SLOTS};
use super::ArtifactError;

const NUMERIC_PREFIX: &str = "num__";

/// Per-feature mean and scale, in numeric slot order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column names the statistics were fit on (optional in the blob).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,

    /// Fitted means
    pub mean: Vec<f64>,

    /// Fitted scales (standard deviations)
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Build a scaler from explicit statistics.
    ///
    /// # Errors
    /// Returns `ArtifactError::InvalidPreprocessor` if the statistics do not
    /// describe the numeric block.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        let scaler = Self {
            feature_names: None,
            mean,
            scale,
        };
        scaler.check()?;
        Ok(scaler)
    }

    /// Deserialize and validate a preprocessor blob.
    ///
    /// # Errors
    /// Returns `ArtifactError::Deserialization` for unreadable JSON and
    /// `ArtifactError::InvalidPreprocessor` for statistics that do not match
    /// the numeric slot schema.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let scaler: Self = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactError::Deserialization(format!("preprocessor: {e}")))?;
        scaler.check()?;
        Ok(scaler)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        if self.mean.len() != NUMERIC_SLOTS || self.scale.len() != NUMERIC_SLOTS {
            return Err(ArtifactError::InvalidPreprocessor(format!(
                "expected {NUMERIC_SLOTS} mean/scale pairs, got {}/{}",
                self.mean.len(),
                self.scale.len()
            )));
        }

        if let Some(names) = &self.feature_names {
            if names.len() != NUMERIC_SLOTS {
                return Err(ArtifactError::InvalidPreprocessor(format!(
                    "expected {NUMERIC_SLOTS} feature names, got {}",
                    names.len()
                )));
            }
            for (i, (name, expected)) in names.iter().zip(NUMERIC_FEATURE_NAMES).enumerate() {
                let bare = name.strip_prefix(NUMERIC_PREFIX).unwrap_or(name);
                let expected_bare = expected.strip_prefix(NUMERIC_PREFIX).unwrap_or(expected);
                if bare != expected_bare {
                    return Err(ArtifactError::InvalidPreprocessor(format!(
                        "feature {i} is {name:?}, expected {expected:?}"
                    )));
                }
            }
        }

        for (i, (m, s)) in self.mean.iter().zip(&self.scale).enumerate() {
            if !m.is_finite() {
                return Err(ArtifactError::InvalidPreprocessor(format!(
                    "mean[{i}] is not finite"
                )));
            }
            if !s.is_finite() || *s == 0.0 {
                return Err(ArtifactError::InvalidPreprocessor(format!(
                    "scale[{i}] must be finite and non-zero, got {s}"
                )));
            }
        }

        Ok(())
    }

    /// Number of features the scaler was fit on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one numeric row: `(raw - mean) / scale` per feature.
    ///
    /// # Errors
    /// Returns `ArtifactError::InvalidPreprocessor` if the row length differs
    /// from the fitted feature count.
    pub fn transform(&self, raw: &[f64]) -> Result<Vec<f64>, ArtifactError> {
        if raw.len() != self.mean.len() || self.mean.len() != self.scale.len() {
            return Err(ArtifactError::InvalidPreprocessor(format!(
                "feature count mismatch: row has {}, scaler has {}/{}",
                raw.len(),
                self.mean.len(),
                self.scale.len()
            )));
        }

        Ok(raw
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }
}

#[cfg(test)]
pub(crate) fn identity_scaler() -> StandardScaler {
    StandardScaler {
        feature_names: None,
        mean: vec![0.0; NUMERIC_SLOTS],
        scale: vec![1.0; NUMERIC_SLOTS],
    }
}
