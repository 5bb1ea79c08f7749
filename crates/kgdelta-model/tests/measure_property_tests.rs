use kgdelta_model::{div_scaled, DatasetId, DatasetPair, PerDatasetCount, SCALE};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn dataset(index: usize) -> DatasetId {
    DatasetId::new(format!("http://example.org/dataset/{index}"))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn pair_construction_ignores_argument_order(a in 0usize..50, b in 0usize..50) {
        let forward = DatasetPair::new(dataset(a), dataset(b));
        let backward = DatasetPair::new(dataset(b), dataset(a));
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward.is_none(), a == b);
    }

    #[test]
    fn pairs_of_yields_every_unordered_pair(n in 0usize..12) {
        let datasets: Vec<DatasetId> = (0..n).map(dataset).collect();
        let pairs = DatasetPair::pairs_of(&datasets);
        prop_assert_eq!(pairs.len(), n * n.saturating_sub(1) / 2);
        let distinct: std::collections::BTreeSet<_> = pairs.iter().cloned().collect();
        prop_assert_eq!(distinct.len(), pairs.len());
    }

    #[test]
    fn scaled_division_never_exceeds_the_scale(numerator in 0u64..1_000_000, denominator in 1u64..1_000_000) {
        let value = div_scaled(Decimal::from(numerator), Decimal::from(denominator))
            .expect("nonzero denominator");
        prop_assert!(value.scale() <= SCALE);
    }

    #[test]
    fn count_difference_saturates(a in 0u64..1000, b in 0u64..1000) {
        let datasets = [dataset(0)];
        let mut minuend = PerDatasetCount::zeroed(&datasets);
        minuend.set(&datasets[0], a);
        let mut subtrahend = PerDatasetCount::zeroed(&datasets);
        subtrahend.set(&datasets[0], b);
        let difference = PerDatasetCount::difference_of(&minuend, &subtrahend);
        prop_assert_eq!(difference.get(&datasets[0]), Some(a.saturating_sub(b)));
    }
}
