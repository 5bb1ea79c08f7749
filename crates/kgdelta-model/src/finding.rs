//! Findings: deviation, omission, duplicate and issue annotations.
//!
//! Findings are partitioned per affected dataset so that "what does dataset
//! X's report look like" is a simple filter. The store is append-only;
//! comparators never retract a finding.

use crate::{AspectId, DatasetId, EntityTerm, Value};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Finding {
    /// Two corresponding entities both hold an unmatched value for the same
    /// variable.
    Deviation {
        aspect: AspectId,
        entity: EntityTerm,
        variable: String,
        value: Value,
        compared_to_dataset: DatasetId,
        compared_to_entity: EntityTerm,
        compared_to_value: Value,
    },
    /// One side of a correspondence lacks a value present on the other side.
    ValueOmission {
        aspect: AspectId,
        entity: EntityTerm,
        variable: String,
        compared_to_dataset: DatasetId,
        compared_to_entity: EntityTerm,
        missing_value: Value,
    },
    /// A dataset lacks an entity present in another dataset.
    ResourceOmission {
        aspect: AspectId,
        compared_to_dataset: DatasetId,
        compared_to_entity: EntityTerm,
    },
    /// Two entities of the same dataset fall into one equivalence class.
    Duplicate {
        aspect: AspectId,
        entity: EntityTerm,
        duplicate_of: EntityTerm,
    },
    /// A locally recovered data-shape problem, e.g. a literal bound where an
    /// entity reference was required.
    Issue {
        aspect: AspectId,
        entity: EntityTerm,
        message: String,
    },
}

/// Append-only finding sink, partitioned per affected dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingStore {
    by_dataset: AHashMap<DatasetId, Vec<Finding>>,
}

impl FindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dataset: &DatasetId, finding: Finding) {
        self.by_dataset
            .entry(dataset.clone())
            .or_default()
            .push(finding);
    }

    pub fn of_dataset(&self, dataset: &DatasetId) -> &[Finding] {
        self.by_dataset
            .get(dataset)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn datasets(&self) -> impl Iterator<Item = &DatasetId> {
        self.by_dataset.keys()
    }

    pub fn len(&self) -> usize {
        self.by_dataset.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DatasetId, &Finding)> {
        self.by_dataset
            .iter()
            .flat_map(|(d, fs)| fs.iter().map(move |f| (d, f)))
    }
}

/// Values flagged elsewhere as known-wrong for an (entity, variable, aspect).
///
/// Wrong values take part in no statistic and are never re-reported as
/// deviations or omissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WrongValueRegistry {
    entries: AHashSet<(DatasetId, EntityTerm, String, Value)>,
}

impl WrongValueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(
        &mut self,
        dataset: DatasetId,
        entity: EntityTerm,
        variable: impl Into<String>,
        value: Value,
    ) {
        self.entries.insert((dataset, entity, variable.into(), value));
    }

    pub fn is_wrong(
        &self,
        dataset: &DatasetId,
        entity: &EntityTerm,
        variable: &str,
        value: &Value,
    ) -> bool {
        self.entries.contains(&(
            dataset.clone(),
            entity.clone(),
            variable.to_string(),
            value.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_partitioned_per_dataset() {
        let d1 = DatasetId::from("http://example.org/d1");
        let d2 = DatasetId::from("http://example.org/d2");
        let aspect = AspectId::from("http://example.org/aspect/person");
        let mut store = FindingStore::new();
        store.add(
            &d1,
            Finding::ResourceOmission {
                aspect: aspect.clone(),
                compared_to_dataset: d2.clone(),
                compared_to_entity: EntityTerm::iri("http://example.org/d2/alice"),
            },
        );
        assert_eq!(store.of_dataset(&d1).len(), 1);
        assert!(store.of_dataset(&d2).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn wrong_value_lookup_is_exact() {
        let d = DatasetId::from("http://example.org/d1");
        let e = EntityTerm::iri("http://example.org/d1/alice");
        let v = Value::Literal(crate::Literal::string("alice"));
        let mut registry = WrongValueRegistry::new();
        registry.mark(d.clone(), e.clone(), "name", v.clone());
        assert!(registry.is_wrong(&d, &e, "name", &v));
        assert!(!registry.is_wrong(&d, &e, "label", &v));
    }
}
