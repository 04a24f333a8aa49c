//! Clinical record submitted for cardiovascular risk assessment.
//!
//! Field names follow the service's JSON input contract (snake_case).

use serde::{Deserialize, Serialize};

/// Raw clinical risk factors for one patient.
///
/// All fields are required; unknown keys are ignored. Range checks belong
/// to the boundary ([`ClinicalRecord::validate`]); the feature builder
/// accepts any well-typed record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    /// Age in years
    pub age: i64,

    /// 0 = female, 1 = male
    pub gender: i64,

    /// Chest pain type, categorical code 0-3
    pub chest_pain_type: i64,

    /// Resting systolic blood pressure in mmHg
    pub systolic_bp: i64,

    /// Serum cholesterol in mg/dL
    pub cholesterol: i64,

    /// Fasting blood sugar > 120 mg/dL: 0 = false, 1 = true
    pub fasting_blood_sugar: i64,

    /// Resting electrocardiogram result, categorical code 0-2
    pub resting_ekg: i64,

    /// Maximum heart rate achieved
    pub max_heart_rate: i64,

    /// Exercise induced angina: 0 = no, 1 = yes
    pub exercise_induced_angina: i64,

    /// ST depression induced by exercise relative to rest
    pub oldpeak: f64,

    /// Slope of the peak exercise ST segment (documented 1-3, encoded over 0-3)
    pub slope: i64,

    /// Number of major vessels colored by fluoroscopy, 0-3
    pub num_major_vessels: i64,
}

/// JSON field names, in input-contract order.
pub const RECORD_FIELDS: [&str; 12] = [
    "age",
    "gender",
    "chest_pain_type",
    "systolic_bp",
    "cholesterol",
    "fasting_blood_sugar",
    "resting_ekg",
    "max_heart_rate",
    "exercise_induced_angina",
    "oldpeak",
    "slope",
    "num_major_vessels",
];

fn check_range(errors: &mut Vec<String>, name: &str, value: i64, lo: i64, hi: i64) {
    if !(lo..=hi).contains(&value) {
        errors.push(format!("{name} {value} out of range [{lo}, {hi}]"));
    }
}

fn check_flag(errors: &mut Vec<String>, name: &str, value: i64) {
    if value != 0 && value != 1 {
        errors.push(format!("{name} {value} must be 0 or 1"));
    }
}

impl ClinicalRecord {
    /// Validate that all fields are within their declared ranges.
    ///
    /// Called by the service boundary before a record reaches the engine.
    ///
    /// # Errors
    /// Returns every violation found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        check_range(&mut errors, "age", self.age, 1, 120);
        check_flag(&mut errors, "gender", self.gender);
        check_range(&mut errors, "chest_pain_type", self.chest_pain_type, 0, 3);
        check_range(&mut errors, "systolic_bp", self.systolic_bp, 50, 300);
        check_range(&mut errors, "cholesterol", self.cholesterol, 50, 700);
        check_flag(&mut errors, "fasting_blood_sugar", self.fasting_blood_sugar);
        check_range(&mut errors, "resting_ekg", self.resting_ekg, 0, 2);
        check_range(&mut errors, "max_heart_rate", self.max_heart_rate, 40, 250);
        check_flag(
            &mut errors,
            "exercise_induced_angina",
            self.exercise_induced_angina,
        );
        if !self.oldpeak.is_finite() || !(-10.0..=10.0).contains(&self.oldpeak) {
            errors.push(format!(
                "oldpeak {} out of range [-10, 10]",
                self.oldpeak
            ));
        }
        check_range(&mut errors, "slope", self.slope, 0, 3);
        check_range(&mut errors, "num_major_vessels", self.num_major_vessels, 0, 3);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
pub(crate) fn reference_record() -> ClinicalRecord {
    ClinicalRecord {
        age: 52,
        gender: 1,
        chest_pain_type: 0,
        systolic_bp: 125,
        cholesterol: 212,
        fasting_blood_sugar: 0,
        resting_ekg: 1,
        max_heart_rate: 168,
        exercise_induced_angina: 0,
        oldpeak: 1.0,
        slope: 2,
        num_major_vessels: 2,
    }
}
