//! Aspects: entity-type definitions with one extraction pattern per dataset.
//!
//! The pattern itself (its query language, its evaluation) lives behind the
//! `PatternMatcher` contract in `kgdelta-engine`. The model layer only
//! records *that* a dataset is covered and *which* variables its pattern
//! binds, because measurements must never be emitted for a variable a
//! dataset's pattern does not cover.

use crate::{ConfigurationError, DatasetId};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// IRI identifying one aspect (entity type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AspectId(pub String);

impl AspectId {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AspectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AspectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-dataset extraction pattern declaration.
///
/// `covered_variables` is fixed once the pattern is set; it drives which
/// (dataset, variable) combinations participate in value comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AspectPattern {
    pub covered_variables: BTreeSet<String>,
}

impl AspectPattern {
    pub fn new<I, S>(covered_variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            covered_variables: covered_variables.into_iter().map(Into::into).collect(),
        }
    }
}

/// An entity type: key variable name plus at most one pattern per dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aspect {
    id: AspectId,
    key_variable: String,
    patterns: AHashMap<DatasetId, AspectPattern>,
}

impl Aspect {
    pub fn new(id: AspectId, key_variable: impl Into<String>) -> Self {
        Self {
            id,
            key_variable: key_variable.into(),
            patterns: AHashMap::new(),
        }
    }

    pub fn id(&self) -> &AspectId {
        &self.id
    }

    pub fn key_variable(&self) -> &str {
        &self.key_variable
    }

    /// Registers the pattern for one dataset. A second pattern for the same
    /// (aspect, dataset) is a configuration error, never an overwrite.
    pub fn set_pattern(
        &mut self,
        dataset: DatasetId,
        pattern: AspectPattern,
    ) -> Result<(), ConfigurationError> {
        if self.patterns.contains_key(&dataset) {
            return Err(ConfigurationError::DuplicatePattern {
                aspect: self.id.clone(),
                dataset,
            });
        }
        self.patterns.insert(dataset, pattern);
        Ok(())
    }

    pub fn covers_dataset(&self, dataset: &DatasetId) -> bool {
        self.patterns.contains_key(dataset)
    }

    pub fn pattern(&self, dataset: &DatasetId) -> Option<&AspectPattern> {
        self.patterns.get(dataset)
    }

    /// Datasets that define a pattern for this aspect, in stable order.
    pub fn datasets(&self) -> Vec<DatasetId> {
        let mut datasets: Vec<_> = self.patterns.keys().cloned().collect();
        datasets.sort();
        datasets
    }

    pub fn variable_covered_by(&self, variable: &str, dataset: &DatasetId) -> bool {
        self.patterns
            .get(dataset)
            .is_some_and(|p| p.covered_variables.contains(variable))
    }

    pub fn variable_covered_by_both(
        &self,
        variable: &str,
        first: &DatasetId,
        second: &DatasetId,
    ) -> bool {
        self.variable_covered_by(variable, first) && self.variable_covered_by(variable, second)
    }
}

/// All aspects of one comparison plan, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct AspectRegistry {
    aspects: AHashMap<AspectId, Aspect>,
}

impl AspectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, aspect: Aspect) -> Result<(), ConfigurationError> {
        if self.aspects.contains_key(aspect.id()) {
            return Err(ConfigurationError::DuplicateAspect(aspect.id().clone()));
        }
        self.aspects.insert(aspect.id().clone(), aspect);
        Ok(())
    }

    pub fn get(&self, id: &AspectId) -> Result<&Aspect, ConfigurationError> {
        self.aspects
            .get(id)
            .ok_or_else(|| ConfigurationError::UnknownAspect(id.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aspect> {
        self.aspects.values()
    }
}
