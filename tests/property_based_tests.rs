//! Property-based tests for the statistics and filtering core
//!
//! Properties covered:
//! 1. Aggregates keep the average between minimum and maximum
//! 2. Mann-Whitney p-values and A12 values stay in [0, 1]
//! 3. Verdicts never depend on A12 when the U test is not significant
//! 4. Manual exclusion always wins over every other rule
//! 5. The per-category draw is deterministic

use chrono::{TimeZone, Utc};
use droidstudy::analysis::{
    classify, float_text_grouped, mann_whitney_u, vargha_delaney_a12, ApproachStats, Verdict,
};
use droidstudy::config::SelectionConfig;
use droidstudy::selection::{
    AppFilter, CatalogEntry, DeterministicSampler, ExclusionReason, FilterOutcome, PackageMap,
    PackageRecord,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn record(package: &str) -> PackageRecord {
    PackageRecord {
        name: package.to_string(),
        target_sdk_version: Some(28),
        min_sdk_version: Some(21),
        package: package.to_string(),
        source: None,
        categories: vec!["Tools".to_string()],
        url: None,
        last_updated: None,
        version_code: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_average_between_min_and_max(values in prop::collection::vec(0.0f64..100.0, 1..30)) {
        let stats = ApproachStats::from_values(&values);
        prop_assert!(stats.min <= stats.average);
        prop_assert!(stats.average <= stats.max);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_statistics_in_unit_interval(
        x in prop::collection::vec(0.0f64..100.0, 1..15),
        y in prop::collection::vec(0.0f64..100.0, 1..15),
    ) {
        let test = mann_whitney_u(&x, &y).unwrap();
        prop_assert!((0.0..=1.0).contains(&test.pvalue), "p = {}", test.pvalue);

        let a12 = vargha_delaney_a12(&x, &y).unwrap();
        prop_assert!((0.0..=1.0).contains(&a12), "A12 = {}", a12);
    }

    #[test]
    fn prop_a12_is_antisymmetric(
        x in prop::collection::vec(0u8..20, 1..12),
        y in prop::collection::vec(0u8..20, 1..12),
    ) {
        let x: Vec<f64> = x.into_iter().map(f64::from).collect();
        let y: Vec<f64> = y.into_iter().map(f64::from).collect();
        let forward = vargha_delaney_a12(&x, &y).unwrap();
        let backward = vargha_delaney_a12(&y, &x).unwrap();
        prop_assert!((forward + backward - 1.0).abs() < 1e-9);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_not_significant_is_same(pvalue in 0.0501f64..=1.0, a12 in 0.0f64..=1.0) {
        prop_assert_eq!(classify(pvalue, a12, 0.05), Verdict::Same);
    }

    #[test]
    fn prop_significant_is_never_same(pvalue in 0.0f64..=0.05, a12 in 0.0f64..=1.0) {
        prop_assert_ne!(classify(pvalue, a12, 0.05), Verdict::Same);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_manual_exclusion_has_precedence(
        categories in prop::collection::vec(prop_oneof![Just("Games"), Just("Tools"), Just("Writing")], 0..3),
        last_updated in prop::option::of(0i64..2_000_000_000_000),
    ) {
        let config = SelectionConfig::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let filter = AppFilter::new(&config, now);
        let entry = CatalogEntry {
            package: "com.diblui.fullcolemak".to_string(),
            name: "Full Colemak".to_string(),
            categories: categories.into_iter().map(String::from).collect(),
            last_updated,
            version: None,
        };

        let outcome = filter.evaluate(&entry);
        prop_assert!(matches!(
            outcome,
            FilterOutcome::Excluded(ExclusionReason::Manual(_))
        ));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_draw_is_deterministic(seed in any::<u64>(), size in 1usize..40) {
        let bucket: PackageMap = (0..size)
            .map(|i| {
                let package = format!("org.app{:03}", i);
                (package.clone(), record(&package))
            })
            .collect();
        let taken = HashSet::new();

        let first = DeterministicSampler::draw(seed, &bucket, &taken);
        let second = DeterministicSampler::draw(seed, &bucket, &taken);
        prop_assert_eq!(&first, &second);

        let (position, _) = first.unwrap();
        prop_assert!((1..=size).contains(&position));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_grouping_round_trips(value in 0u32..10_000_000) {
        let text = float_text_grouped(f64::from(value));
        let digits: String = text.chars().filter(|c| *c != ',').collect();
        prop_assert_eq!(digits, format!("{}.0", value));
    }
}
