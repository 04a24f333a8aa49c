//! Inference engine: one feature row in, one probability out.

use std::sync::Arc;

use crate::application::Artifact;
use crate::domain::{ArtifactError, FeatureVector, FEATURE_COUNT};
use crate::ports::Predictor;
use crate::AssessmentError;

/// Runs the loaded model on a single feature vector.
///
/// Stateless apart from the shared read-only model handle, so one engine can
/// serve any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    model: Artifact<dyn Predictor>,
}

impl InferenceEngine {
    #[must_use]
    pub fn new(model: Artifact<dyn Predictor>) -> Self {
        Self { model }
    }

    /// Engine over an already-loaded predictor.
    #[must_use]
    pub fn with_predictor(predictor: Arc<dyn Predictor>) -> Self {
        Self::new(Artifact::Present(predictor))
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.model.is_present()
    }

    /// Predict the positive-class probability for `vector`.
    ///
    /// # Errors
    /// `ModelUnavailable` if the model failed to load, `Integrity` if the
    /// model returns something other than a probability.
    pub fn predict(&self, vector: &FeatureVector) -> Result<f64, AssessmentError> {
        self.predict_slice(vector.as_slice())
    }

    /// Predict from an untyped row.
    ///
    /// # Errors
    /// As [`InferenceEngine::predict`], plus `ShapeMismatch` when the row
    /// does not have exactly 25 slots.
    pub fn predict_slice(&self, features: &[f64]) -> Result<f64, AssessmentError> {
        let model = match &self.model {
            Artifact::Present(model) => model,
            Artifact::Absent { reason } => {
                return Err(AssessmentError::ModelUnavailable(reason.clone()));
            }
        };

        if features.len() != FEATURE_COUNT {
            tracing::error!(
                "Feature row has {} slots, expected {FEATURE_COUNT}",
                features.len()
            );
            return Err(AssessmentError::ShapeMismatch {
                expected: FEATURE_COUNT,
                actual: features.len(),
                vector: features.to_vec(),
            });
        }

        let probability = model.predict_proba(features).map_err(|e| match e {
            ArtifactError::ShapeMismatch(_) => AssessmentError::ShapeMismatch {
                expected: FEATURE_COUNT,
                actual: features.len(),
                vector: features.to_vec(),
            },
            other => AssessmentError::Integrity(other.to_string()),
        })?;

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            tracing::error!("Model returned {probability}, which is not a probability");
            return Err(AssessmentError::Integrity(format!(
                "model output {probability} outside [0, 1]"
            )));
        }

        Ok(probability)
    }
}

#[cfg(test)]
pub(crate) mod stubs {
    use super::*;

    /// Returns the same probability for any 25-slot row.
    #[derive(Debug)]
    pub struct FixedPredictor(pub f64);

    impl Predictor for FixedPredictor {
        fn predict_proba(&self, features: &[f64]) -> Result<f64, ArtifactError> {
            if features.len() != FEATURE_COUNT {
                return Err(ArtifactError::ShapeMismatch(format!(
                    "got {} inputs",
                    features.len()
                )));
            }
            Ok(self.0)
        }

        fn describe(&self) -> String {
            format!("fixed({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stubs::FixedPredictor;
    use super::*;
    use crate::domain::logistic_fixture;

    #[test]
    fn test_model_absent() {
        let engine = InferenceEngine::new(Artifact::absent("archive is missing weights"));
        assert!(!engine.is_available());

        let err = engine
            .predict(&FeatureVector::default())
            .expect_err("must fail");
        assert_eq!(
            err,
            AssessmentError::ModelUnavailable("archive is missing weights".into())
        );
    }

    #[test]
    fn test_fixed_output() {
        let engine = InferenceEngine::with_predictor(Arc::new(FixedPredictor(0.73)));
        let p = engine.predict(&FeatureVector::default()).expect("predict");
        assert_eq!(p, 0.73);
    }

    #[test]
    fn test_shape_mismatch_carries_vector() {
        let engine = InferenceEngine::with_predictor(Arc::new(FixedPredictor(0.2)));
        let row = vec![0.5; 24];
        match engine.predict_slice(&row) {
            Err(AssessmentError::ShapeMismatch {
                expected,
                actual,
                vector,
            }) => {
                assert_eq!(expected, 25);
                assert_eq!(actual, 24);
                assert_eq!(vector, row);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_absent_model_wins_over_shape() {
        let engine = InferenceEngine::new(Artifact::absent("gone"));
        assert!(matches!(
            engine.predict_slice(&[1.0, 2.0]),
            Err(AssessmentError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_rejects_non_probability() {
        for bad in [1.5, -0.1, f64::NAN] {
            let engine = InferenceEngine::with_predictor(Arc::new(FixedPredictor(bad)));
            assert!(matches!(
                engine.predict(&FeatureVector::default()),
                Err(AssessmentError::Integrity(_))
            ));
        }
    }

    #[test]
    fn test_real_model_forward() {
        let mut kernel = [0.0; FEATURE_COUNT];
        kernel[0] = 1.0;
        let model = logistic_fixture(kernel, 0.0);
        let engine = InferenceEngine::with_predictor(Arc::new(model));

        let mut row = [0.0; FEATURE_COUNT];
        let p = engine.predict_slice(&row).expect("predict");
        assert!((p - 0.5).abs() < 1e-12);

        row[0] = 2.0;
        let p = engine.predict_slice(&row).expect("predict");
        assert!((p - 1.0 / (1.0 + (-2.0f64).exp())).abs() < 1e-12);
    }
}
