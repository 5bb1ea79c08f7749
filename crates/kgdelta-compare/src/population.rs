//! Entity-existence comparison per aspect.
//!
//! For every aspect the comparator walks the equivalence-class partition
//! once. Each class tells it, per dataset, how often the class occurs; from
//! that single pass it derives counts, duplicate counts, pairwise coverage,
//! resource omissions and the mark-recapture completeness estimate.

use crate::stats::{mark_recapture_completeness, PopulationRounding};
use ahash::AHashMap;
use kgdelta_engine::{CorrespondenceStore, PatternMatcher};
use kgdelta_model::{
    AspectId, AspectRegistry, ConfigurationError, DatasetId, DatasetPair, EntityTerm, Finding,
    FindingStore, MeasurementKind, MeasurementStore, PerDatasetCount, PerDatasetPairCount,
    PerTupelRatio,
};
use std::collections::BTreeSet;
use tracing::debug;

pub struct PopulationComparator {
    aspects: Vec<AspectId>,
}

impl PopulationComparator {
    pub fn new(aspects: Vec<AspectId>) -> Self {
        Self { aspects }
    }

    pub fn run(
        &self,
        registry: &AspectRegistry,
        matcher: &dyn PatternMatcher,
        store: &mut CorrespondenceStore,
        measurements: &mut MeasurementStore,
        findings: &mut FindingStore,
    ) -> Result<(), ConfigurationError> {
        for aspect_id in &self.aspects {
            let aspect = registry.get(aspect_id)?;
            self.compare_aspect(aspect_id, aspect, matcher, store, measurements, findings)?;
        }
        Ok(())
    }

    fn compare_aspect(
        &self,
        aspect_id: &AspectId,
        aspect: &kgdelta_model::Aspect,
        matcher: &dyn PatternMatcher,
        store: &mut CorrespondenceStore,
        measurements: &mut MeasurementStore,
        findings: &mut FindingStore,
    ) -> Result<(), ConfigurationError> {
        let datasets = aspect.datasets();
        let pairs = DatasetPair::pairs_of(&datasets);

        // Working sets of not-yet-classed keys, one per dataset. Every key
        // is marked relevant so singletons surface as one-element classes.
        let mut unprocessed: AHashMap<DatasetId, BTreeSet<EntityTerm>> = AHashMap::new();
        let mut count = PerDatasetCount::zeroed(&datasets);
        for dataset in &datasets {
            let keys = matcher.resource_keys(aspect, dataset)?;
            store.mark_relevant(aspect_id, keys.iter());
            count.set(dataset, keys.len() as u64);
            unprocessed.insert(dataset.clone(), keys);
        }

        let mut duplicate_count = PerDatasetCount::zeroed(&datasets);
        let mut absolute_coverage = PerDatasetPairCount::zeroed(&pairs);

        for class in store.equivalence_classes(aspect_id) {
            // Per-dataset occurrences of this class, consumed from the
            // working sets.
            let mut occurrences: AHashMap<&DatasetId, Vec<&EntityTerm>> = AHashMap::new();
            for dataset in &datasets {
                let pending = unprocessed.get_mut(dataset).expect("dataset key set");
                let members: Vec<&EntityTerm> =
                    class.iter().filter(|m| pending.contains(*m)).collect();
                for member in &members {
                    pending.remove(*member);
                }
                occurrences.insert(dataset, members);
            }

            for pair in &pairs {
                let covered = !occurrences[&pair.first].is_empty()
                    && !occurrences[&pair.second].is_empty();
                if covered {
                    absolute_coverage.increment(pair);
                }
            }

            for dataset in &datasets {
                let members = &occurrences[dataset];
                if members.is_empty() {
                    // The class is missing here; every member elsewhere is a
                    // resource omission against this dataset.
                    for other in &datasets {
                        if other == dataset {
                            continue;
                        }
                        for member in &occurrences[other] {
                            findings.add(
                                dataset,
                                Finding::ResourceOmission {
                                    aspect: aspect_id.clone(),
                                    compared_to_dataset: other.clone(),
                                    compared_to_entity: (*member).clone(),
                                },
                            );
                        }
                    }
                    continue;
                }
                duplicate_count.increment_by(dataset, members.len() as u64 - 1);
                // One duplicate finding per unordered member pair.
                for (i, first) in members.iter().enumerate() {
                    for second in &members[i + 1..] {
                        findings.add(
                            dataset,
                            Finding::Duplicate {
                                aspect: aspect_id.clone(),
                                entity: (*first).clone(),
                                duplicate_of: (*second).clone(),
                            },
                        );
                    }
                }
            }
        }
        // Every relevant key belongs to exactly one class, so the working
        // sets drain completely.
        debug_assert!(unprocessed.values().all(BTreeSet::is_empty));

        let deduplicated = PerDatasetCount::difference_of(&count, &duplicate_count);
        let relative_coverage = PerTupelRatio::ratio_of(&absolute_coverage, &deduplicated);
        let completeness = mark_recapture_completeness(
            &pairs,
            &absolute_coverage,
            &deduplicated,
            PopulationRounding::Whole,
        );

        debug!(
            aspect = aspect_id.as_str(),
            datasets = datasets.len(),
            coverage_total = absolute_coverage.total(),
            "population comparison done"
        );

        count.publish(MeasurementKind::Count, aspect_id, None, measurements);
        deduplicated.publish(MeasurementKind::DeduplicatedCount, aspect_id, None, measurements);
        absolute_coverage.publish(MeasurementKind::AbsoluteCoverage, aspect_id, None, measurements);
        relative_coverage.publish(MeasurementKind::RelativeCoverage, aspect_id, None, measurements);
        completeness.publish(MeasurementKind::MarCompleteness, aspect_id, None, measurements);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgdelta_engine::TableMatcher;
    use kgdelta_model::{Aspect, AspectPattern};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dataset(n: &str) -> DatasetId {
        DatasetId::new(format!("http://example.org/dataset/{n}"))
    }

    fn entity(n: &str) -> EntityTerm {
        EntityTerm::iri(format!("http://example.org/entity/{n}"))
    }

    fn person_aspect(datasets: &[&DatasetId]) -> (AspectRegistry, Aspect) {
        let id = AspectId::from("http://example.org/aspect/person");
        let mut aspect = Aspect::new(id, "person");
        for d in datasets {
            aspect
                .set_pattern((*d).clone(), AspectPattern::new(["name"]))
                .unwrap();
        }
        let mut registry = AspectRegistry::new();
        registry.insert(aspect.clone()).unwrap();
        (registry, aspect)
    }

    /// Three datasets: d1 has four entities, d2 has two mapped plus a
    /// duplicate pair, d3 has one unmapped entity.
    fn fixture() -> (
        AspectRegistry,
        TableMatcher,
        CorrespondenceStore,
        Vec<DatasetId>,
    ) {
        let (d1, d2, d3) = (dataset("1"), dataset("2"), dataset("3"));
        let (registry, aspect) = person_aspect(&[&d1, &d2, &d3]);

        let mut matcher = TableMatcher::new();
        for n in ["111", "112", "113", "114"] {
            matcher.insert_key(&aspect, &d1, entity(n));
        }
        for n in ["211", "212", "221", "222"] {
            matcher.insert_key(&aspect, &d2, entity(n));
        }
        matcher.insert_key(&aspect, &d3, entity("315"));

        let mut store = CorrespondenceStore::new();
        let id = AspectId::from("http://example.org/aspect/person");
        store.add_correspondence(&id, &[entity("111"), entity("211")]);
        store.add_correspondence(&id, &[entity("112"), entity("212")]);
        // duplicate pair in d2, both corresponding to 113
        store.add_correspondence(&id, &[entity("113"), entity("221"), entity("222")]);

        (registry, matcher, store, vec![d1, d2, d3])
    }

    fn run_fixture() -> (MeasurementStore, FindingStore, Vec<DatasetId>) {
        let (registry, matcher, mut store, datasets) = fixture();
        let mut measurements = MeasurementStore::new();
        let mut findings = FindingStore::new();
        PopulationComparator::new(vec![AspectId::from("http://example.org/aspect/person")])
            .run(&registry, &matcher, &mut store, &mut measurements, &mut findings)
            .unwrap();
        (measurements, findings, datasets)
    }

    fn value_for(
        measurements: &MeasurementStore,
        kind: MeasurementKind,
        dataset: &DatasetId,
        compared_to: &[&DatasetId],
    ) -> Option<Decimal> {
        let aspect = AspectId::from("http://example.org/aspect/person");
        let compared: BTreeSet<DatasetId> = compared_to.iter().map(|d| (*d).clone()).collect();
        measurements.value(kind, &aspect, dataset, None, &compared)
    }

    #[test]
    fn counts_and_deduplicated_counts() {
        let (measurements, _, datasets) = run_fixture();
        let (d1, d2, d3) = (&datasets[0], &datasets[1], &datasets[2]);
        assert_eq!(
            value_for(&measurements, MeasurementKind::Count, d1, &[]),
            Some(Decimal::from(4))
        );
        assert_eq!(
            value_for(&measurements, MeasurementKind::Count, d2, &[]),
            Some(Decimal::from(4))
        );
        assert_eq!(
            value_for(&measurements, MeasurementKind::Count, d3, &[]),
            Some(Decimal::from(1))
        );
        // 221/222 collapse into one class member in d2
        assert_eq!(
            value_for(&measurements, MeasurementKind::DeduplicatedCount, d2, &[]),
            Some(Decimal::from(3))
        );
        assert_eq!(
            value_for(&measurements, MeasurementKind::DeduplicatedCount, d1, &[]),
            Some(Decimal::from(4))
        );
    }

    #[test]
    fn absolute_and_relative_coverage() {
        let (measurements, _, datasets) = run_fixture();
        let (d1, d2, d3) = (&datasets[0], &datasets[1], &datasets[2]);
        assert_eq!(
            value_for(&measurements, MeasurementKind::AbsoluteCoverage, d1, &[d2]),
            Some(Decimal::from(3))
        );
        assert_eq!(
            value_for(&measurements, MeasurementKind::AbsoluteCoverage, d2, &[d1]),
            Some(Decimal::from(3))
        );
        assert_eq!(
            value_for(&measurements, MeasurementKind::AbsoluteCoverage, d1, &[d3]),
            Some(Decimal::from(0))
        );
        // 3 of d2's 3 deduplicated entities are covered by d1
        assert_eq!(
            value_for(&measurements, MeasurementKind::RelativeCoverage, d1, &[d2]),
            Some(Decimal::from_str("1.0000000000000000").unwrap())
        );
        // 3 of d1's 4 entities are covered by d2
        assert_eq!(
            value_for(&measurements, MeasurementKind::RelativeCoverage, d2, &[d1]),
            Some(Decimal::from_str("0.7500000000000000").unwrap())
        );
    }

    #[test]
    fn duplicates_reported_once_per_pair() {
        let (_, findings, datasets) = run_fixture();
        let d2 = &datasets[1];
        let duplicates: Vec<&Finding> = findings
            .of_dataset(d2)
            .iter()
            .filter(|f| matches!(f, Finding::Duplicate { .. }))
            .collect();
        assert_eq!(duplicates.len(), 1);
        match duplicates[0] {
            Finding::Duplicate {
                entity: a,
                duplicate_of: b,
                ..
            } => {
                assert_eq!(
                    BTreeSet::from([a.clone(), b.clone()]),
                    BTreeSet::from([entity("221"), entity("222")])
                );
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn resource_omissions_for_unmapped_entities() {
        let (_, findings, datasets) = run_fixture();
        let (d1, d2, d3) = (&datasets[0], &datasets[1], &datasets[2]);
        // d3 misses everything present in d1 and d2
        let d3_omissions = findings
            .of_dataset(d3)
            .iter()
            .filter(|f| matches!(f, Finding::ResourceOmission { .. }))
            .count();
        // 4 entities of d1 + 4 of d2
        assert_eq!(d3_omissions, 8);
        // d1 misses 315; d2 misses 315 and 114 is missed by d2
        assert!(findings.of_dataset(d1).contains(&Finding::ResourceOmission {
            aspect: AspectId::from("http://example.org/aspect/person"),
            compared_to_dataset: d3.clone(),
            compared_to_entity: entity("315"),
        }));
        assert!(findings.of_dataset(d2).contains(&Finding::ResourceOmission {
            aspect: AspectId::from("http://example.org/aspect/person"),
            compared_to_dataset: d1.clone(),
            compared_to_entity: entity("114"),
        }));
    }

    #[test]
    fn completeness_rounds_population_to_whole_entities() {
        let (d1, d2) = (dataset("1"), dataset("2"));
        let (registry, aspect) = person_aspect(&[&d1, &d2]);

        let mut matcher = TableMatcher::new();
        for n in ["a1", "a2", "a3"] {
            matcher.insert_key(&aspect, &d1, entity(n));
        }
        for n in ["b1", "b2", "b3"] {
            matcher.insert_key(&aspect, &d2, entity(n));
        }
        let id = AspectId::from("http://example.org/aspect/person");
        let mut store = CorrespondenceStore::new();
        store.add_correspondence(&id, &[entity("a1"), entity("b1")]);
        store.add_correspondence(&id, &[entity("a2"), entity("b2")]);

        let mut measurements = MeasurementStore::new();
        let mut findings = FindingStore::new();
        PopulationComparator::new(vec![id.clone()])
            .run(&registry, &matcher, &mut store, &mut measurements, &mut findings)
            .unwrap();

        // population = 3*3/2 = 4.5, rounded to 5; completeness = 3/5
        assert_eq!(
            value_for(&measurements, MeasurementKind::MarCompleteness, &d1, &[&d2]),
            Some(Decimal::from_str("0.6000000000000000").unwrap())
        );
    }
}
