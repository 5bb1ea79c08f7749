//! Per-variable value comparison.
//!
//! Runs over the same equivalence-class partition as the population
//! comparator, but looks inside the entities: for every configured variable
//! it matches the values of corresponding entities under the tolerant
//! equivalence rules and derives value counts, deduplicated counts, pairwise
//! coverage, deviations and value omissions.
//!
//! Known-wrong values and values excluded by the language filter are dropped
//! while loading bindings; they take part in no statistic and no finding.

use crate::equivalence::{lang_matches, LiteralTolerance, ResourceAwareEquivalence, ValueEquivalence};
use crate::stats::{mark_recapture_completeness, PopulationRounding};
use ahash::{AHashMap, AHashSet};
use kgdelta_engine::{CorrespondenceStore, PatternMatcher, ValuesByVariable};
use kgdelta_model::{
    AspectId, AspectRegistry, ConfigurationError, DatasetId, DatasetPair, EntityTerm, Finding,
    FindingStore, MeasurementKind, MeasurementStore, PerDatasetCount, PerDatasetPairCount,
    PerTupelRatio, Value, WrongValueRegistry,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Parameters of one value-comparison pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueComparisonConfig {
    pub aspect: AspectId,
    pub variables: Vec<String>,
    /// Language ranges a string value must match to take part; the default
    /// (`""` and `"*"`) admits everything.
    #[serde(default = "default_language_filter")]
    pub language_filter_patterns: Vec<String>,
    #[serde(default)]
    pub allow_time_skip: bool,
    #[serde(default)]
    pub allow_lang_tag_skip: bool,
}

fn default_language_filter() -> Vec<String> {
    vec![String::new(), "*".to_string()]
}

impl ValueComparisonConfig {
    pub fn new<I, S>(aspect: AspectId, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            aspect,
            variables: variables.into_iter().map(Into::into).collect(),
            language_filter_patterns: default_language_filter(),
            allow_time_skip: false,
            allow_lang_tag_skip: false,
        }
    }
}

/// Per-variable accumulators, restricted to the datasets whose pattern
/// covers the variable.
struct VariableAccumulator {
    datasets: Vec<DatasetId>,
    pairs: Vec<DatasetPair>,
    count: PerDatasetCount,
    deduplicated: PerDatasetCount,
    coverage: PerDatasetPairCount,
}

impl VariableAccumulator {
    fn new(datasets: Vec<DatasetId>) -> Self {
        let pairs = DatasetPair::pairs_of(&datasets);
        Self {
            count: PerDatasetCount::zeroed(&datasets),
            deduplicated: PerDatasetCount::zeroed(&datasets),
            coverage: PerDatasetPairCount::zeroed(&pairs),
            datasets,
            pairs,
        }
    }
}

pub struct ValueComparator {
    config: ValueComparisonConfig,
}

impl ValueComparator {
    pub fn new(config: ValueComparisonConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        registry: &AspectRegistry,
        matcher: &dyn PatternMatcher,
        store: &mut CorrespondenceStore,
        wrong_values: &WrongValueRegistry,
        measurements: &mut MeasurementStore,
        findings: &mut FindingStore,
    ) -> Result<(), ConfigurationError> {
        if self.config.variables.is_empty() {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "variables".to_string(),
                reason: "at least one variable to compare is required".to_string(),
            });
        }

        let aspect = registry.get(&self.config.aspect)?;
        let datasets = aspect.datasets();

        let mut accumulators: Vec<(String, VariableAccumulator)> = Vec::new();
        for variable in &self.config.variables {
            let covering: Vec<DatasetId> = datasets
                .iter()
                .filter(|d| aspect.variable_covered_by(variable, d))
                .cloned()
                .collect();
            if !covering.is_empty() {
                accumulators.push((variable.clone(), VariableAccumulator::new(covering)));
            }
        }

        let mut pending: AHashMap<DatasetId, BTreeSet<EntityTerm>> = AHashMap::new();
        for dataset in &datasets {
            let keys = matcher.resource_keys(aspect, dataset)?;
            store.mark_relevant(&self.config.aspect, keys.iter());
            pending.insert(dataset.clone(), keys);
        }

        let classes = store.equivalence_classes(&self.config.aspect);
        let tolerance = LiteralTolerance {
            allow_time_skip: self.config.allow_time_skip,
            allow_lang_tag_skip: self.config.allow_lang_tag_skip,
        };
        let equivalence = ResourceAwareEquivalence::new(store, tolerance);

        for class in &classes {
            // Bindings of this class's members, per dataset, already filtered.
            let mut bindings: AHashMap<&DatasetId, Vec<(EntityTerm, ValuesByVariable)>> =
                AHashMap::new();
            for dataset in &datasets {
                let pending = pending.get_mut(dataset).expect("dataset key set");
                let members: Vec<EntityTerm> = class
                    .iter()
                    .filter(|m| pending.contains(*m))
                    .cloned()
                    .collect();
                for member in &members {
                    pending.remove(member);
                }
                let mut loaded = Vec::with_capacity(members.len());
                let mut fetched = matcher.resource_values_bulk(
                    aspect,
                    dataset,
                    &members,
                    &self.config.variables,
                )?;
                for member in members {
                    let mut values = fetched.remove(&member).unwrap_or_default();
                    self.filter_values(dataset, &member, &mut values, wrong_values);
                    loaded.push((member, values));
                }
                bindings.insert(dataset, loaded);
            }

            for (variable, accumulator) in &mut accumulators {
                compare_class_variable(
                    &self.config.aspect,
                    variable,
                    accumulator,
                    &bindings,
                    &equivalence,
                    findings,
                );
            }
        }
        debug_assert!(pending.values().all(BTreeSet::is_empty));

        for (variable, accumulator) in &accumulators {
            let relative =
                PerTupelRatio::ratio_of(&accumulator.coverage, &accumulator.deduplicated);
            let completeness = mark_recapture_completeness(
                &accumulator.pairs,
                &accumulator.coverage,
                &accumulator.deduplicated,
                PopulationRounding::Scaled,
            );
            debug!(
                aspect = self.config.aspect.as_str(),
                variable = variable.as_str(),
                coverage_total = accumulator.coverage.total(),
                "value comparison done"
            );
            let aspect_id = &self.config.aspect;
            let variable = Some(variable.as_str());
            accumulator
                .count
                .publish(MeasurementKind::Count, aspect_id, variable, measurements);
            accumulator.deduplicated.publish(
                MeasurementKind::DeduplicatedCount,
                aspect_id,
                variable,
                measurements,
            );
            accumulator.coverage.publish(
                MeasurementKind::AbsoluteCoverage,
                aspect_id,
                variable,
                measurements,
            );
            relative.publish(
                MeasurementKind::RelativeCoverage,
                aspect_id,
                variable,
                measurements,
            );
            completeness.publish(
                MeasurementKind::MarCompleteness,
                aspect_id,
                variable,
                measurements,
            );
        }
        Ok(())
    }

    /// Drops known-wrong values and string values excluded by the language
    /// filter.
    fn filter_values(
        &self,
        dataset: &DatasetId,
        entity: &EntityTerm,
        bindings: &mut ValuesByVariable,
        wrong_values: &WrongValueRegistry,
    ) {
        for (variable, values) in bindings.iter_mut() {
            values.retain(|value| {
                if wrong_values.is_wrong(dataset, entity, variable, value) {
                    return false;
                }
                match value.as_literal() {
                    Some(literal) if literal.is_string_like() => {
                        let tag = literal.language_tag();
                        self.config
                            .language_filter_patterns
                            .iter()
                            .any(|pattern| lang_matches(tag, pattern))
                    }
                    _ => true,
                }
            });
        }
    }
}

/// One (class, variable) comparison step: counts, distinct values, coverage,
/// deviations and omissions.
fn compare_class_variable(
    aspect_id: &AspectId,
    variable: &str,
    accumulator: &mut VariableAccumulator,
    bindings: &AHashMap<&DatasetId, Vec<(EntityTerm, ValuesByVariable)>>,
    equivalence: &dyn ValueEquivalence,
    findings: &mut FindingStore,
) {
    let empty = AHashSet::new();
    let values_of = |dataset: &DatasetId, index: usize| -> &AHashSet<Value> {
        bindings[dataset][index].1.get(variable).unwrap_or(&empty)
    };

    // Distinct values per dataset: merge values that are equivalent into one
    // entry, keeping the first seen as representative.
    let mut distinct: AHashMap<&DatasetId, Vec<Value>> = AHashMap::new();
    for dataset in &accumulator.datasets {
        let mut representatives: Vec<Value> = Vec::new();
        let mut total = 0u64;
        for index in 0..bindings[dataset].len() {
            for value in values_of(dataset, index) {
                total += 1;
                if !representatives
                    .iter()
                    .any(|seen| equivalence.equivalent(seen, value))
                {
                    representatives.push(value.clone());
                }
            }
        }
        accumulator.count.increment_by(dataset, total);
        accumulator
            .deduplicated
            .increment_by(dataset, representatives.len() as u64);
        distinct.insert(dataset, representatives);
    }

    for pair in &accumulator.pairs {
        let matched = distinct[&pair.first]
            .iter()
            .filter(|v1| {
                distinct[&pair.second]
                    .iter()
                    .any(|v2| equivalence.equivalent(v1, v2))
            })
            .count() as u64;
        accumulator.coverage.increment_by(pair, matched);

        // Deviations and omissions are judged per entity pair: values with
        // no match on the other entity are unmatched; an omission is only
        // reported against an entity whose own values all matched.
        for (index1, (entity1, _)) in bindings[&pair.first].iter().enumerate() {
            for (index2, (entity2, _)) in bindings[&pair.second].iter().enumerate() {
                let values1 = values_of(&pair.first, index1);
                let values2 = values_of(&pair.second, index2);
                let unmatched1: Vec<&Value> = values1
                    .iter()
                    .filter(|v1| !values2.iter().any(|v2| equivalence.equivalent(v1, v2)))
                    .collect();
                let unmatched2: Vec<&Value> = values2
                    .iter()
                    .filter(|v2| !values1.iter().any(|v1| equivalence.equivalent(v1, v2)))
                    .collect();
                match (unmatched1.is_empty(), unmatched2.is_empty()) {
                    (false, false) => {
                        for value1 in &unmatched1 {
                            for value2 in &unmatched2 {
                                findings.add(
                                    &pair.first,
                                    Finding::Deviation {
                                        aspect: aspect_id.clone(),
                                        entity: entity1.clone(),
                                        variable: variable.to_string(),
                                        value: (*value1).clone(),
                                        compared_to_dataset: pair.second.clone(),
                                        compared_to_entity: entity2.clone(),
                                        compared_to_value: (*value2).clone(),
                                    },
                                );
                                findings.add(
                                    &pair.second,
                                    Finding::Deviation {
                                        aspect: aspect_id.clone(),
                                        entity: entity2.clone(),
                                        variable: variable.to_string(),
                                        value: (*value2).clone(),
                                        compared_to_dataset: pair.first.clone(),
                                        compared_to_entity: entity1.clone(),
                                        compared_to_value: (*value1).clone(),
                                    },
                                );
                            }
                        }
                    }
                    (false, true) => {
                        // entity2 matched completely but entity1 has extras
                        for value1 in &unmatched1 {
                            findings.add(
                                &pair.second,
                                Finding::ValueOmission {
                                    aspect: aspect_id.clone(),
                                    entity: entity2.clone(),
                                    variable: variable.to_string(),
                                    compared_to_dataset: pair.first.clone(),
                                    compared_to_entity: entity1.clone(),
                                    missing_value: (*value1).clone(),
                                },
                            );
                        }
                    }
                    (true, false) => {
                        for value2 in &unmatched2 {
                            findings.add(
                                &pair.first,
                                Finding::ValueOmission {
                                    aspect: aspect_id.clone(),
                                    entity: entity1.clone(),
                                    variable: variable.to_string(),
                                    compared_to_dataset: pair.second.clone(),
                                    compared_to_entity: entity2.clone(),
                                    missing_value: (*value2).clone(),
                                },
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}
