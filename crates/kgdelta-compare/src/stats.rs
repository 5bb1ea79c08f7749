//! Mark-recapture (Lincoln-Petersen) completeness estimation.
//!
//! The estimator needs the pairwise overlap between samples: if no class
//! ever joined entities (or values) of two datasets, there is nothing to
//! estimate from and completeness is skipped entirely.

use kgdelta_model::{
    div_scaled, DatasetPair, PerDatasetCount, PerDatasetPairCount, PerDatasetRatio,
};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeSet;

/// How the estimated population size is rounded before the per-dataset
/// division. The population variant rounds to a whole number of entities;
/// the per-variable variant keeps the full fractional scale. Both choices
/// affect numeric expectations and are preserved separately on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationRounding {
    Whole,
    Scaled,
}

/// `completeness[d] = deduplicated[d] / estimated_population`, where the
/// population estimate is `Σ dedup[d1]·dedup[d2] / Σ overlap[d1,d2]` over
/// all unordered pairs with data on both sides.
///
/// Returns an empty ratio when the total pairwise overlap is zero.
pub fn mark_recapture_completeness(
    pairs: &[DatasetPair],
    coverage: &PerDatasetPairCount,
    deduplicated: &PerDatasetCount,
    rounding: PopulationRounding,
) -> PerDatasetRatio {
    let usable: Vec<&DatasetPair> = pairs
        .iter()
        .filter(|p| {
            deduplicated.get(&p.first).is_some() && deduplicated.get(&p.second).is_some()
        })
        .collect();

    let total_overlap: u64 = usable
        .iter()
        .filter_map(|p| coverage.get(p))
        .sum();
    if total_overlap == 0 {
        return PerDatasetRatio::default();
    }

    let mut product_sum = Decimal::ZERO;
    for pair in &usable {
        let d1 = Decimal::from(deduplicated.get(&pair.first).unwrap_or(0));
        let d2 = Decimal::from(deduplicated.get(&pair.second).unwrap_or(0));
        product_sum += d1 * d2;
    }
    let mut population = match div_scaled(product_sum, Decimal::from(total_overlap)) {
        Some(p) => p,
        None => return PerDatasetRatio::default(),
    };
    if rounding == PopulationRounding::Whole {
        population = population.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    }

    let datasets: BTreeSet<_> = usable
        .iter()
        .flat_map(|p| [p.first.clone(), p.second.clone()])
        .collect();
    let mut completeness = PerDatasetRatio::default();
    for dataset in &datasets {
        let numerator = Decimal::from(deduplicated.get(dataset).unwrap_or(0));
        if let Some(value) = div_scaled(numerator, population) {
            completeness.set(dataset, value);
        }
    }
    completeness
}
