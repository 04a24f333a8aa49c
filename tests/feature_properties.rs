//! Property tests for the record-to-vector builder.

use cardiorisk::domain::features::{
    CATEGORICAL_GROUPS, CHEST_PAIN, NUMERIC_FEATURE_NAMES, NUMERIC_SLOTS, OLDPEAK_BIN,
    RESTING_EKG, SLOPE,
};
use cardiorisk::domain::{
    build_feature_vector, oldpeak_bin, ClinicalRecord, StandardScaler, FEATURE_COUNT,
};
use proptest::prelude::*;

fn valid_record() -> impl Strategy<Value = ClinicalRecord> {
    (
        (1i64..=120, 0i64..=1, 0i64..=3, 50i64..=300),
        (50i64..=700, 0i64..=1, 0i64..=2, 40i64..=250),
        (0i64..=1, -10.0f64..=10.0, 0i64..=3, 0i64..=3),
    )
        .prop_map(
            |(
                (age, gender, chest_pain_type, systolic_bp),
                (cholesterol, fasting_blood_sugar, resting_ekg, max_heart_rate),
                (exercise_induced_angina, oldpeak, slope, num_major_vessels),
            )| ClinicalRecord {
                age,
                gender,
                chest_pain_type,
                systolic_bp,
                cholesterol,
                fasting_blood_sugar,
                resting_ekg,
                max_heart_rate,
                exercise_induced_angina,
                oldpeak,
                slope,
                num_major_vessels,
            },
        )
}

fn fitted_scaler() -> impl Strategy<Value = StandardScaler> {
    (
        prop::collection::vec(-500.0f64..500.0, NUMERIC_SLOTS),
        prop::collection::vec(0.01f64..5000.0, NUMERIC_SLOTS),
    )
        .prop_map(|(mean, scale)| StandardScaler::new(mean, scale).expect("valid scaler"))
}

proptest! {
    #[test]
    fn vector_has_fixed_width_and_exact_one_hots(
        record in valid_record(),
        scaler in fitted_scaler(),
    ) {
        let vector = build_feature_vector(&record, &scaler).expect("build");
        prop_assert_eq!(vector.as_slice().len(), FEATURE_COUNT);

        for group in CATEGORICAL_GROUPS {
            let slots = vector.group(group);
            prop_assert_eq!(slots.iter().sum::<f64>(), 1.0, "group {}", group.name);
            prop_assert!(slots.iter().all(|v| *v == 0.0 || *v == 1.0));
        }

        prop_assert_eq!(vector.group(CHEST_PAIN)[record.chest_pain_type as usize], 1.0);
        prop_assert_eq!(vector.group(RESTING_EKG)[record.resting_ekg as usize], 1.0);
        prop_assert_eq!(vector.group(SLOPE)[record.slope as usize], 1.0);
        prop_assert_eq!(
            vector.group(OLDPEAK_BIN)[oldpeak_bin(record.oldpeak) as usize],
            1.0
        );
    }

    #[test]
    fn build_is_bitwise_deterministic(
        record in valid_record(),
        scaler in fitted_scaler(),
    ) {
        let a = build_feature_vector(&record, &scaler).expect("build");
        let b = build_feature_vector(&record, &scaler).expect("build");
        prop_assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn numeric_block_uses_fitted_statistics(
        record in valid_record(),
        scaler in fitted_scaler(),
    ) {
        let vector = build_feature_vector(&record, &scaler).expect("build");
        let raw = [
            record.age as f64,
            record.gender as f64,
            record.systolic_bp as f64,
            record.cholesterol as f64,
            record.fasting_blood_sugar as f64,
            record.max_heart_rate as f64,
            record.exercise_induced_angina as f64,
            record.oldpeak,
            record.num_major_vessels as f64,
            record.age as f64 * record.max_heart_rate as f64,
        ];
        for (i, name) in NUMERIC_FEATURE_NAMES.iter().enumerate() {
            let expected = (raw[i] - scaler.mean[i]) / scaler.scale[i];
            let actual = vector.get(name).expect("named slot");
            prop_assert!(
                (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
                "{}: {} vs {}", name, actual, expected
            );
        }
    }

    #[test]
    fn oldpeak_bin_is_monotone(a in -20.0f64..20.0, b in -20.0f64..20.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(oldpeak_bin(lo) <= oldpeak_bin(hi));
        prop_assert!((0..=3).contains(&oldpeak_bin(lo)));
    }

    #[test]
    fn out_of_range_chest_pain_zero_fills(
        record in valid_record(),
        code in prop_oneof![-5i64..0, 4i64..50],
    ) {
        let scaler = StandardScaler::new(vec![0.0; NUMERIC_SLOTS], vec![1.0; NUMERIC_SLOTS])
            .expect("scaler");
        let record = ClinicalRecord { chest_pain_type: code, ..record };
        let vector = build_feature_vector(&record, &scaler).expect("build");
        prop_assert!(vector.group(CHEST_PAIN).iter().all(|v| *v == 0.0));
        prop_assert_eq!(vector.group(SLOPE).iter().sum::<f64>(), 1.0);
    }
}

#[test]
fn oldpeak_bin_boundaries() {
    assert_eq!(oldpeak_bin(0.999), 0);
    assert_eq!(oldpeak_bin(1.0), 1);
    assert_eq!(oldpeak_bin(2.9999), 2);
    assert_eq!(oldpeak_bin(3.0), 3);
    assert_eq!(oldpeak_bin(-5.0), 0);
}
