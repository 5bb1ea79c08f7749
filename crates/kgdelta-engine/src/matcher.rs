//! Pattern-matcher contract (the boundary to the query layer).
//!
//! The comparators never see a query language. They ask a `PatternMatcher`
//! for the entity keys of an (aspect, dataset) and for per-entity variable
//! bindings, and the matcher answers from whatever machinery sits behind it.
//! `TableMatcher` answers from in-memory tables; it backs the test suites
//! and the CLI plan loader.

use ahash::{AHashMap, AHashSet};
use kgdelta_model::{Aspect, ConfigurationError, DatasetId, EntityTerm, Value};
use std::collections::BTreeSet;

/// Bindings of one entity: variable name to set of values. A variable that
/// the dataset's pattern does not cover is absent from the map; a covered
/// variable without values maps to an empty set.
pub type ValuesByVariable = AHashMap<String, AHashSet<Value>>;

pub trait PatternMatcher: Send + Sync {
    /// Distinct projection of the aspect's key variable for one dataset.
    fn resource_keys(
        &self,
        aspect: &Aspect,
        dataset: &DatasetId,
    ) -> Result<BTreeSet<EntityTerm>, ConfigurationError>;

    /// Bindings for one entity, restricted to the requested variables.
    /// `None` if the key does not match the pattern at all.
    fn resource_values(
        &self,
        aspect: &Aspect,
        dataset: &DatasetId,
        key: &EntityTerm,
        variables: &[String],
    ) -> Result<Option<ValuesByVariable>, ConfigurationError>;

    /// Batched form of [`Self::resource_values`]; keys that do not match are
    /// absent from the result.
    fn resource_values_bulk(
        &self,
        aspect: &Aspect,
        dataset: &DatasetId,
        keys: &[EntityTerm],
        variables: &[String],
    ) -> Result<AHashMap<EntityTerm, ValuesByVariable>, ConfigurationError> {
        let mut bindings = AHashMap::new();
        for key in keys {
            if let Some(values) = self.resource_values(aspect, dataset, key, variables)? {
                bindings.insert(key.clone(), values);
            }
        }
        Ok(bindings)
    }
}

/// In-memory matcher backed by explicit per-(aspect, dataset) tables.
#[derive(Debug, Default)]
pub struct TableMatcher {
    rows: AHashMap<(String, DatasetId), AHashMap<EntityTerm, ValuesByVariable>>,
}

impl TableMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity key without any binding.
    pub fn insert_key(&mut self, aspect: &Aspect, dataset: &DatasetId, key: EntityTerm) {
        self.rows
            .entry((aspect.id().as_str().to_string(), dataset.clone()))
            .or_default()
            .entry(key)
            .or_default();
    }

    /// Registers one (key, variable, value) binding.
    pub fn insert_value(
        &mut self,
        aspect: &Aspect,
        dataset: &DatasetId,
        key: EntityTerm,
        variable: impl Into<String>,
        value: Value,
    ) {
        self.rows
            .entry((aspect.id().as_str().to_string(), dataset.clone()))
            .or_default()
            .entry(key)
            .or_default()
            .entry(variable.into())
            .or_default()
            .insert(value);
    }

    fn table(
        &self,
        aspect: &Aspect,
        dataset: &DatasetId,
    ) -> Option<&AHashMap<EntityTerm, ValuesByVariable>> {
        self.rows
            .get(&(aspect.id().as_str().to_string(), dataset.clone()))
    }
}

impl PatternMatcher for TableMatcher {
    fn resource_keys(
        &self,
        aspect: &Aspect,
        dataset: &DatasetId,
    ) -> Result<BTreeSet<EntityTerm>, ConfigurationError> {
        if !aspect.covers_dataset(dataset) {
            return Err(ConfigurationError::MissingPattern {
                aspect: aspect.id().clone(),
                dataset: dataset.clone(),
            });
        }
        Ok(self
            .table(aspect, dataset)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn resource_values(
        &self,
        aspect: &Aspect,
        dataset: &DatasetId,
        key: &EntityTerm,
        variables: &[String],
    ) -> Result<Option<ValuesByVariable>, ConfigurationError> {
        let Some(row) = self.table(aspect, dataset).and_then(|table| table.get(key)) else {
            return Ok(None);
        };
        let mut values = ValuesByVariable::new();
        for variable in variables {
            if !aspect.variable_covered_by(variable, dataset) {
                continue;
            }
            let bound = row.get(variable).cloned().unwrap_or_default();
            values.insert(variable.clone(), bound);
        }
        Ok(Some(values))
    }
}
