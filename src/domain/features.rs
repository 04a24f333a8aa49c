//! Feature vector schema and the record-to-vector builder.
//!
//! The layout is fixed by the training-time pipeline: 10 standardized numeric
//! slots followed by 15 one-hot slots. Names below are the column names the
//! model was trained with and must never be reordered.

use super::preprocessor::StandardScaler;
use super::record::ClinicalRecord;
use super::ArtifactError;

/// Total number of slots in a feature vector.
pub const FEATURE_COUNT: usize = 25;

/// Number of standardized numeric slots at the head of the vector.
pub const NUMERIC_SLOTS: usize = 10;

/// Slot names, in model input order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "num__age",
    "num__gender",
    "num__restingBP",
    "num__serumcholestrol",
    "num__fastingbloodsugar",
    "num__maxheartrate",
    "num__exerciseangia",
    "num__oldpeak",
    "num__noofmajorvessels",
    "num__age_maxheartrate_interaction",
    "cat__chestpain_0",
    "cat__chestpain_1",
    "cat__chestpain_2",
    "cat__chestpain_3",
    "cat__restingrelectro_0",
    "cat__restingrelectro_1",
    "cat__restingrelectro_2",
    "cat__slope_0",
    "cat__slope_1",
    "cat__slope_2",
    "cat__slope_3",
    "cat__oldpeak_binned_0",
    "cat__oldpeak_binned_1",
    "cat__oldpeak_binned_2",
    "cat__oldpeak_binned_3",
];

/// Numeric slot names (the scaler's columns).
pub const NUMERIC_FEATURE_NAMES: [&str; NUMERIC_SLOTS] = [
    "num__age",
    "num__gender",
    "num__restingBP",
    "num__serumcholestrol",
    "num__fastingbloodsugar",
    "num__maxheartrate",
    "num__exerciseangia",
    "num__oldpeak",
    "num__noofmajorvessels",
    "num__age_maxheartrate_interaction",
];

/// A one-hot encoded categorical group: slot offset and width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoricalGroup {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
}

pub const CHEST_PAIN: CategoricalGroup = CategoricalGroup {
    name: "chestpain",
    offset: 10,
    width: 4,
};
pub const RESTING_EKG: CategoricalGroup = CategoricalGroup {
    name: "restingrelectro",
    offset: 14,
    width: 3,
};
pub const SLOPE: CategoricalGroup = CategoricalGroup {
    name: "slope",
    offset: 17,
    width: 4,
};
pub const OLDPEAK_BIN: CategoricalGroup = CategoricalGroup {
    name: "oldpeak_binned",
    offset: 21,
    width: 4,
};

/// Categorical groups in vector order.
pub const CATEGORICAL_GROUPS: [CategoricalGroup; 4] = [CHEST_PAIN, RESTING_EKG, SLOPE, OLDPEAK_BIN];

/// Right-open bin edges for oldpeak: (-inf, 1), [1, 2), [2, 3), [3, +inf).
const OLDPEAK_EDGES: [f64; 3] = [1.0, 2.0, 3.0];

/// Fixed-length model input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Slot values in model order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of a slot by its schema name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    /// Slots of one categorical group.
    #[must_use]
    pub fn group(&self, group: CategoricalGroup) -> &[f64] {
        &self.0[group.offset..group.offset + group.width]
    }

    /// Bit patterns of every slot (exact equality checks).
    #[must_use]
    pub fn to_bits(&self) -> [u64; FEATURE_COUNT] {
        self.0.map(f64::to_bits)
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = usize;

    /// Fails with the actual length when it is not [`FEATURE_COUNT`].
    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        <[f64; FEATURE_COUNT]>::try_from(values)
            .map(Self)
            .map_err(|_| values.len())
    }
}

/// Bucket an oldpeak value into 0..=3 using right-open intervals.
///
/// NaN compares false against every edge and lands in bucket 0.
#[must_use]
pub fn oldpeak_bin(oldpeak: f64) -> i64 {
    OLDPEAK_EDGES.iter().filter(|edge| oldpeak >= **edge).count() as i64
}

/// Age times max heart rate, unscaled.
#[must_use]
pub fn age_heart_rate_interaction(record: &ClinicalRecord) -> f64 {
    record.age as f64 * record.max_heart_rate as f64
}

/// Raw numeric block in scaler column order.
#[must_use]
pub fn numeric_block(record: &ClinicalRecord) -> [f64; NUMERIC_SLOTS] {
    [
        record.age as f64,
        record.gender as f64,
        record.systolic_bp as f64,
        record.cholesterol as f64,
        record.fasting_blood_sugar as f64,
        record.max_heart_rate as f64,
        record.exercise_induced_angina as f64,
        record.oldpeak,
        record.num_major_vessels as f64,
        age_heart_rate_interaction(record),
    ]
}

/// Write a one-hot encoding of `value` into the group's slots.
///
/// Codes outside `0..width` leave every slot at zero.
fn one_hot(slots: &mut [f64; FEATURE_COUNT], group: CategoricalGroup, value: i64) {
    let block = &mut slots[group.offset..group.offset + group.width];
    block.fill(0.0);
    if let Ok(k) = usize::try_from(value) {
        if let Some(slot) = block.get_mut(k) {
            *slot = 1.0;
        }
    }
}

/// Build the model input for one record.
///
/// Pure and deterministic: the numeric block is standardized with the
/// scaler's fitted statistics, then the categorical groups are one-hot
/// encoded at fixed widths.
///
/// # Errors
/// Returns `ArtifactError::InvalidPreprocessor` if the scaler does not cover
/// exactly the numeric block.
pub fn build_feature_vector(
    record: &ClinicalRecord,
    scaler: &StandardScaler,
) -> Result<FeatureVector, ArtifactError> {
    let scaled = scaler.transform(&numeric_block(record))?;
    if scaled.len() != NUMERIC_SLOTS {
        return Err(ArtifactError::InvalidPreprocessor(format!(
            "scaler produced {} values, expected {NUMERIC_SLOTS}",
            scaled.len()
        )));
    }

    let mut slots = [0.0; FEATURE_COUNT];
    slots[..NUMERIC_SLOTS].copy_from_slice(&scaled);

    one_hot(&mut slots, CHEST_PAIN, record.chest_pain_type);
    one_hot(&mut slots, RESTING_EKG, record.resting_ekg);
    one_hot(&mut slots, SLOPE, record.slope);
    one_hot(&mut slots, OLDPEAK_BIN, oldpeak_bin(record.oldpeak));

    Ok(FeatureVector(slots))
}
