//! Risk assessment service: record in, decision out.
//!
//! The service owns the immutable artifact bundle produced at start-up. It is
//! `Send + Sync` and holds no mutable state, so callers share it behind an
//! `Arc` and run assessments concurrently.

use std::time::Instant;

use crate::application::artifacts::ArtifactsReport;
use crate::application::{Artifact, Artifacts, InferenceEngine};
use crate::domain::{build_feature_vector, ClinicalRecord, RiskAssessmentResult};
use crate::AssessmentError;

/// Orchestrates feature construction, inference and the decision rule.
#[derive(Debug, Clone)]
pub struct RiskAssessmentService {
    artifacts: Artifacts,
    engine: InferenceEngine,
}

impl RiskAssessmentService {
    /// Create the service from a loaded artifact bundle.
    #[must_use]
    pub fn new(artifacts: Artifacts) -> Self {
        let engine = InferenceEngine::new(artifacts.model().clone());
        if !artifacts.is_ready() {
            tracing::warn!("Risk assessment service created without a complete artifact set");
        }
        Self { artifacts, engine }
    }

    /// True only when both the preprocessor and the model are loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.artifacts.is_ready()
    }

    #[must_use]
    pub fn status(&self) -> &ArtifactsReport {
        self.artifacts.status()
    }

    /// Assess one record.
    ///
    /// The record is assumed to be well-formed; range checks belong to the
    /// caller (see [`ClinicalRecord::validate`]).
    ///
    /// # Errors
    /// `PreprocessorUnavailable` or `ModelUnavailable` when an artifact is
    /// absent, `ShapeMismatch`/`Integrity` for internal contract faults.
    pub fn assess(&self, record: &ClinicalRecord) -> Result<RiskAssessmentResult, AssessmentError> {
        let started = Instant::now();

        let scaler = match self.artifacts.preprocessor() {
            Artifact::Present(scaler) => scaler,
            Artifact::Absent { reason } => {
                tracing::warn!("Assessment rejected: preprocessor unavailable");
                return Err(AssessmentError::PreprocessorUnavailable(reason.clone()));
            }
        };

        tracing::debug!("Building feature vector...");
        let vector = build_feature_vector(record, scaler).map_err(|e| {
            tracing::error!("Feature vector construction failed: {e}");
            AssessmentError::Integrity(e.to_string())
        })?;

        tracing::debug!("Running forward pass...");
        let probability = self.engine.predict(&vector).map_err(|e| {
            tracing::warn!("Assessment failed: {e}");
            e
        })?;
        let result = RiskAssessmentResult::from_probability(probability);

        tracing::debug!(
            "positive={}, probability={:.4}",
            result.has_heart_disease,
            result.risk_probability
        );
        tracing::info!("Assessment complete in {:?}", started.elapsed());

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::stubs::FixedPredictor;
    use crate::domain::{identity_scaler, reference_record, StandardScaler};
    use crate::ports::Predictor;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` with logs captured at `level` and return them.
    fn captured_logs(level: tracing::Level, f: impl FnOnce()) -> String {
        let buf = SharedBuf::default();
        let sink = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .without_time()
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().expect("lock").clone();
        String::from_utf8(bytes).expect("utf8")
    }

    fn service_with(p: f64) -> RiskAssessmentService {
        RiskAssessmentService::new(Artifacts::new(
            identity_scaler(),
            Arc::new(FixedPredictor(p)),
        ))
    }

    #[test]
    fn test_reference_record_fixed_model() {
        let service = service_with(0.73);
        assert!(service.is_ready());

        let result = service.assess(&reference_record()).expect("assess");
        assert_eq!(result.risk_probability, 0.73);
        assert!(result.has_heart_disease);
        assert_eq!(
            serde_json::to_value(result).expect("json"),
            serde_json::json!({"risk_probability": 0.73, "has_heart_disease": true})
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let result = service_with(0.5).assess(&reference_record()).expect("assess");
        assert!(result.has_heart_disease);

        let result = service_with(0.4999).assess(&reference_record()).expect("assess");
        assert!(!result.has_heart_disease);
    }

    #[test]
    fn test_model_absent_surfaces_error() {
        let artifacts = Artifacts::from_parts(
            Artifact::Present(Arc::new(identity_scaler())),
            Artifact::absent("Archive is missing a weights payload (*.bin)"),
        );
        let service = RiskAssessmentService::new(artifacts);
        assert!(!service.is_ready());

        let err = service.assess(&reference_record()).expect_err("must fail");
        assert!(matches!(err, AssessmentError::ModelUnavailable(ref r) if r.contains("weights")));
    }

    #[test]
    fn test_preprocessor_absent_surfaces_error() {
        let predictor: Arc<dyn Predictor> = Arc::new(FixedPredictor(0.9));
        let artifacts = Artifacts::from_parts(
            Artifact::absent("Deserialization failed"),
            Artifact::Present(predictor),
        );
        let err = RiskAssessmentService::new(artifacts)
            .assess(&reference_record())
            .expect_err("must fail");
        assert!(matches!(err, AssessmentError::PreprocessorUnavailable(_)));
    }

    #[test]
    fn test_out_of_range_code_still_assessed() {
        let mut record = reference_record();
        record.chest_pain_type = 4;
        let result = service_with(0.2).assess(&record).expect("assess");
        assert!(!result.has_heart_disease);
    }

    #[test]
    fn test_uses_fitted_statistics() {
        // A scaler fitted on other data must shift the numeric block; with a
        // logistic model on the age slot this changes the probability.
        let mut kernel = [0.0; crate::domain::FEATURE_COUNT];
        kernel[0] = 1.0;
        let model = Arc::new(crate::domain::logistic_fixture(kernel, 0.0));

        let mut mean = vec![0.0; 10];
        mean[0] = 52.0;
        let scaler = StandardScaler::new(mean, vec![1.0; 10]).expect("scaler");
        let service = RiskAssessmentService::new(Artifacts::new(scaler, model));

        let result = service.assess(&reference_record()).expect("assess");
        assert!((result.risk_probability - 0.5).abs() < 1e-12);
        assert!(result.has_heart_disease);
    }

    #[test]
    fn test_info_log_omits_probability() {
        let service = service_with(0.7312);
        let logs = captured_logs(tracing::Level::INFO, || {
            service.assess(&reference_record()).expect("assess");
        });
        assert!(logs.contains("Assessment complete in"));
        assert!(!logs.contains("0.7312"));
        assert!(!logs.contains("positive="));

        let logs = captured_logs(tracing::Level::DEBUG, || {
            service.assess(&reference_record()).expect("assess");
        });
        assert!(logs.contains("probability=0.7312"));
    }

    #[test]
    fn test_scaler_width_fault_is_logged() {
        let scaler = StandardScaler {
            feature_names: None,
            mean: vec![0.0; 9],
            scale: vec![1.0; 9],
        };
        let predictor: Arc<dyn Predictor> = Arc::new(FixedPredictor(0.9));
        let service = RiskAssessmentService::new(Artifacts::from_parts(
            Artifact::Present(Arc::new(scaler)),
            Artifact::Present(predictor),
        ));

        let mut outcome = None;
        let logs = captured_logs(tracing::Level::ERROR, || {
            outcome = Some(service.assess(&reference_record()));
        });
        let err = outcome.expect("ran").expect_err("must fail");
        assert!(matches!(err, AssessmentError::Integrity(ref m) if m.contains("mismatch")));
        assert!(logs.contains("Feature vector construction failed"));
    }

    #[test]
    fn test_concurrent_assessments() {
        let service = Arc::new(service_with(0.61));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || service.assess(&reference_record()))
            })
            .collect();

        for handle in handles {
            let result = handle.join().expect("thread").expect("assess");
            assert_eq!(result.risk_probability, 0.61);
        }
    }
}
