use kgdelta_compare::{mark_recapture_completeness, PopulationRounding};
use kgdelta_model::{DatasetId, DatasetPair, PerDatasetCount, PerDatasetPairCount};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn dataset(n: &str) -> DatasetId {
    DatasetId::new(format!("http://example.org/dataset/{n}"))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    /// With a sane sample (overlap never exceeds either deduplicated count)
    /// the estimated population covers both samples, so completeness stays
    /// within (0, 1] for either rounding mode.
    #[test]
    fn completeness_is_a_ratio_in_unit_range(
        a in 1u64..200,
        b in 1u64..200,
        overlap_seed in 1u64..200,
        whole in any::<bool>(),
    ) {
        let overlap = overlap_seed.min(a).min(b);
        let datasets = [dataset("a"), dataset("b")];
        let pairs = DatasetPair::pairs_of(&datasets);

        let mut deduplicated = PerDatasetCount::zeroed(&datasets);
        deduplicated.set(&datasets[0], a);
        deduplicated.set(&datasets[1], b);
        let mut coverage = PerDatasetPairCount::zeroed(&pairs);
        coverage.increment_by(&pairs[0], overlap);

        let rounding = if whole { PopulationRounding::Whole } else { PopulationRounding::Scaled };
        let completeness = mark_recapture_completeness(&pairs, &coverage, &deduplicated, rounding);

        for dataset in &datasets {
            let value = completeness.get(dataset).expect("nonzero overlap");
            prop_assert!(value > Decimal::ZERO);
            prop_assert!(value <= Decimal::ONE);
        }
    }

    /// No overlap between the samples means there is nothing to estimate
    /// from; the estimator yields no values instead of a division by zero.
    #[test]
    fn zero_overlap_yields_no_estimate(a in 0u64..200, b in 0u64..200) {
        let datasets = [dataset("a"), dataset("b")];
        let pairs = DatasetPair::pairs_of(&datasets);
        let mut deduplicated = PerDatasetCount::zeroed(&datasets);
        deduplicated.set(&datasets[0], a);
        deduplicated.set(&datasets[1], b);
        let coverage = PerDatasetPairCount::zeroed(&pairs);

        let completeness =
            mark_recapture_completeness(&pairs, &coverage, &deduplicated, PopulationRounding::Scaled);
        prop_assert!(completeness.is_empty());
    }
}
