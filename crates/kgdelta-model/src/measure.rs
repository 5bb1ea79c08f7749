//! Quality measurements and their per-run accumulators.
//!
//! The comparators fill explicit accumulator structs (`PerDatasetCount`,
//! `PerDatasetPairCount`, ...) while walking correspondence groups, then
//! publish them as typed `QualityMeasurement`s into an append-only
//! `MeasurementStore`. All division happens at a fixed decimal scale with
//! half-up rounding so chained measurements keep their precision.

use crate::{AspectId, DatasetId};
use ahash::AHashMap;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fractional digits preserved when rounding after division.
pub const SCALE: u32 = 16;

/// Half-up rounding at [`SCALE`] fractional digits.
pub fn round_scaled(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `numerator / denominator` at [`SCALE`], half-up. `None` on zero denominator.
pub fn div_scaled(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    numerator.checked_div(denominator).map(round_scaled)
}

// ============================================================================
// Dataset pairs and tupels
// ============================================================================

/// Unordered dataset pair. Construction normalizes the order using the
/// stable total order on dataset identities, so symmetric work is done once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetPair {
    pub first: DatasetId,
    pub second: DatasetId,
}

impl DatasetPair {
    /// `None` if both sides are the same dataset.
    pub fn new(a: DatasetId, b: DatasetId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
        }
    }

    /// All unordered pairs over the given datasets.
    pub fn pairs_of(datasets: &[DatasetId]) -> Vec<DatasetPair> {
        let mut pairs = Vec::new();
        for (i, a) in datasets.iter().enumerate() {
            for b in &datasets[i + 1..] {
                if let Some(pair) = DatasetPair::new(a.clone(), b.clone()) {
                    pairs.push(pair);
                }
            }
        }
        pairs.sort();
        pairs.dedup();
        pairs
    }

    pub fn contains(&self, dataset: &DatasetId) -> bool {
        &self.first == dataset || &self.second == dataset
    }

    pub fn other(&self, dataset: &DatasetId) -> Option<&DatasetId> {
        if &self.first == dataset {
            Some(&self.second)
        } else if &self.second == dataset {
            Some(&self.first)
        } else {
            None
        }
    }
}

/// Ordered dataset pair (assessed dataset first, compared dataset second).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetTupel {
    pub assessed: DatasetId,
    pub compared: DatasetId,
}

impl DatasetTupel {
    pub fn new(assessed: DatasetId, compared: DatasetId) -> Self {
        Self { assessed, compared }
    }
}

// ============================================================================
// Accumulators
// ============================================================================

/// Count per dataset.
#[derive(Debug, Clone, Default)]
pub struct PerDatasetCount {
    values: AHashMap<DatasetId, u64>,
}

impl PerDatasetCount {
    pub fn zeroed(datasets: &[DatasetId]) -> Self {
        Self {
            values: datasets.iter().map(|d| (d.clone(), 0)).collect(),
        }
    }

    pub fn set(&mut self, dataset: &DatasetId, value: u64) {
        self.values.insert(dataset.clone(), value);
    }

    pub fn increment_by(&mut self, dataset: &DatasetId, amount: u64) {
        *self.values.entry(dataset.clone()).or_insert(0) += amount;
    }

    /// `minuend - subtrahend` per dataset, saturating at zero.
    pub fn difference_of(minuend: &PerDatasetCount, subtrahend: &PerDatasetCount) -> Self {
        let mut values = AHashMap::new();
        for (dataset, &count) in &minuend.values {
            let sub = subtrahend.get(dataset).unwrap_or(0);
            values.insert(dataset.clone(), count.saturating_sub(sub));
        }
        Self { values }
    }

    pub fn get(&self, dataset: &DatasetId) -> Option<u64> {
        self.values.get(dataset).copied()
    }

    pub fn publish(
        &self,
        kind: MeasurementKind,
        aspect: &AspectId,
        variable: Option<&str>,
        store: &mut MeasurementStore,
    ) {
        for (dataset, &count) in &self.values {
            store.add(QualityMeasurement {
                kind,
                aspect: aspect.clone(),
                dataset: dataset.clone(),
                variable: variable.map(str::to_string),
                compared_to: BTreeSet::new(),
                value: Decimal::from(count),
                unit: Unit::One,
            });
        }
    }
}

/// Symmetric count per unordered dataset pair.
#[derive(Debug, Clone, Default)]
pub struct PerDatasetPairCount {
    values: AHashMap<DatasetPair, u64>,
}

impl PerDatasetPairCount {
    pub fn zeroed(pairs: &[DatasetPair]) -> Self {
        Self {
            values: pairs.iter().map(|p| (p.clone(), 0)).collect(),
        }
    }

    pub fn increment(&mut self, pair: &DatasetPair) {
        self.increment_by(pair, 1);
    }

    pub fn increment_by(&mut self, pair: &DatasetPair, amount: u64) {
        *self.values.entry(pair.clone()).or_insert(0) += amount;
    }

    pub fn get(&self, pair: &DatasetPair) -> Option<u64> {
        self.values.get(pair).copied()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &DatasetPair> {
        self.values.keys()
    }

    /// Sum over all pairs; the total pairwise overlap of the mark-recapture
    /// estimator.
    pub fn total(&self) -> u64 {
        self.values.values().sum()
    }

    /// Published once per direction: (first vs second) and (second vs first).
    pub fn publish(
        &self,
        kind: MeasurementKind,
        aspect: &AspectId,
        variable: Option<&str>,
        store: &mut MeasurementStore,
    ) {
        for (pair, &count) in &self.values {
            for (dataset, compared) in [(&pair.first, &pair.second), (&pair.second, &pair.first)] {
                store.add(QualityMeasurement {
                    kind,
                    aspect: aspect.clone(),
                    dataset: dataset.clone(),
                    variable: variable.map(str::to_string),
                    compared_to: BTreeSet::from([compared.clone()]),
                    value: Decimal::from(count),
                    unit: Unit::One,
                });
            }
        }
    }
}

/// Ratio per dataset, compared against all other datasets of the ratio.
#[derive(Debug, Clone, Default)]
pub struct PerDatasetRatio {
    values: AHashMap<DatasetId, Decimal>,
}

impl PerDatasetRatio {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set(&mut self, dataset: &DatasetId, value: Decimal) {
        self.values.insert(dataset.clone(), value);
    }

    pub fn get(&self, dataset: &DatasetId) -> Option<Decimal> {
        self.values.get(dataset).copied()
    }

    pub fn publish(
        &self,
        kind: MeasurementKind,
        aspect: &AspectId,
        variable: Option<&str>,
        store: &mut MeasurementStore,
    ) {
        for (dataset, &value) in &self.values {
            let compared_to: BTreeSet<DatasetId> = self
                .values
                .keys()
                .filter(|d| *d != dataset)
                .cloned()
                .collect();
            store.add(QualityMeasurement {
                kind,
                aspect: aspect.clone(),
                dataset: dataset.clone(),
                variable: variable.map(str::to_string),
                compared_to,
                value,
                unit: Unit::One,
            });
        }
    }
}

/// Ratio per ordered dataset tupel (e.g. relative coverage).
#[derive(Debug, Clone, Default)]
pub struct PerTupelRatio {
    values: AHashMap<DatasetTupel, Decimal>,
}

impl PerTupelRatio {
    /// Relative coverage: `absolute_coverage[pair] / deduplicated[compared]`
    /// for both directions of every pair, skipping zero denominators.
    pub fn ratio_of(coverage: &PerDatasetPairCount, deduplicated: &PerDatasetCount) -> Self {
        let mut ratio = Self::default();
        for pair in coverage.pairs() {
            let numerator = Decimal::from(coverage.get(pair).unwrap_or(0));
            for (assessed, compared) in [(&pair.first, &pair.second), (&pair.second, &pair.first)] {
                let Some(denominator) = deduplicated.get(compared) else {
                    continue;
                };
                if let Some(value) = div_scaled(numerator, Decimal::from(denominator)) {
                    ratio
                        .values
                        .insert(DatasetTupel::new(assessed.clone(), compared.clone()), value);
                }
            }
        }
        ratio
    }

    pub fn get(&self, assessed: &DatasetId, compared: &DatasetId) -> Option<Decimal> {
        self.values
            .get(&DatasetTupel::new(assessed.clone(), compared.clone()))
            .copied()
    }

    pub fn publish(
        &self,
        kind: MeasurementKind,
        aspect: &AspectId,
        variable: Option<&str>,
        store: &mut MeasurementStore,
    ) {
        for (tupel, &value) in &self.values {
            store.add(QualityMeasurement {
                kind,
                aspect: aspect.clone(),
                dataset: tupel.assessed.clone(),
                variable: variable.map(str::to_string),
                compared_to: BTreeSet::from([tupel.compared.clone()]),
                value,
                unit: Unit::One,
            });
        }
    }
}

// ============================================================================
// Published measurements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Count,
    DeduplicatedCount,
    AbsoluteCoverage,
    RelativeCoverage,
    /// Mark-recapture completeness (Lincoln-Petersen over pairwise overlap).
    MarCompleteness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    One,
}

/// One typed statistic, scoped to (aspect, dataset, optional variable,
/// optional compared-to datasets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMeasurement {
    pub kind: MeasurementKind,
    pub aspect: AspectId,
    pub dataset: DatasetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub compared_to: BTreeSet<DatasetId>,
    pub value: Decimal,
    pub unit: Unit,
}

/// Append-only measurement sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementStore {
    measurements: Vec<QualityMeasurement>,
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, measurement: QualityMeasurement) {
        self.measurements.push(measurement);
    }

    pub fn iter(&self) -> impl Iterator<Item = &QualityMeasurement> {
        self.measurements.iter()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// All measurements of one kind for (aspect, dataset), any variable scope.
    pub fn of(
        &self,
        kind: MeasurementKind,
        aspect: &AspectId,
        dataset: &DatasetId,
    ) -> Vec<&QualityMeasurement> {
        self.measurements
            .iter()
            .filter(|m| m.kind == kind && &m.aspect == aspect && &m.dataset == dataset)
            .collect()
    }

    /// Single value lookup for a fully specified scope.
    pub fn value(
        &self,
        kind: MeasurementKind,
        aspect: &AspectId,
        dataset: &DatasetId,
        variable: Option<&str>,
        compared_to: &BTreeSet<DatasetId>,
    ) -> Option<Decimal> {
        self.measurements
            .iter()
            .find(|m| {
                m.kind == kind
                    && &m.aspect == aspect
                    && &m.dataset == dataset
                    && m.variable.as_deref() == variable
                    && &m.compared_to == compared_to
            })
            .map(|m| m.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: &str) -> DatasetId {
        DatasetId::new(format!("http://example.org/{n}"))
    }

    #[test]
    fn pair_normalizes_order() {
        let pair = DatasetPair::new(d("b"), d("a")).unwrap();
        assert_eq!(pair.first, d("a"));
        assert_eq!(pair.second, d("b"));
        assert!(DatasetPair::new(d("a"), d("a")).is_none());
    }

    #[test]
    fn pairs_of_three() {
        let pairs = DatasetPair::pairs_of(&[d("a"), d("b"), d("c")]);
        assert_eq!(pairs.len(), 3);
        assert!(pairs.contains(&DatasetPair::new(d("a"), d("c")).unwrap()));
    }

    #[test]
    fn deduplicated_is_count_minus_duplicates() {
        let datasets = [d("a"), d("b")];
        let mut count = PerDatasetCount::zeroed(&datasets);
        count.set(&d("a"), 5);
        count.set(&d("b"), 3);
        let mut duplicates = PerDatasetCount::zeroed(&datasets);
        duplicates.increment_by(&d("a"), 2);
        let dedup = PerDatasetCount::difference_of(&count, &duplicates);
        assert_eq!(dedup.get(&d("a")), Some(3));
        assert_eq!(dedup.get(&d("b")), Some(3));
    }

    #[test]
    fn relative_coverage_skips_zero_denominator() {
        let datasets = [d("a"), d("b")];
        let pairs = DatasetPair::pairs_of(&datasets);
        let mut coverage = PerDatasetPairCount::zeroed(&pairs);
        coverage.increment(&pairs[0]);
        let mut dedup = PerDatasetCount::zeroed(&datasets);
        dedup.set(&d("a"), 2);
        dedup.set(&d("b"), 0);
        let ratio = PerTupelRatio::ratio_of(&coverage, &dedup);
        // a vs b has denominator 0 (dedup of b), so only b vs a is present
        assert!(ratio.get(&d("a"), &d("b")).is_none());
        assert_eq!(
            ratio.get(&d("b"), &d("a")),
            Some(round_scaled(Decimal::new(5, 1)))
        );
    }

    #[test]
    fn div_scaled_rounds_half_up() {
        let v = div_scaled(Decimal::from(1), Decimal::from(3)).unwrap();
        assert_eq!(v.to_string(), "0.3333333333333333");
        let v = div_scaled(Decimal::from(2), Decimal::from(3)).unwrap();
        assert_eq!(v.to_string(), "0.6666666666666667");
    }
}
