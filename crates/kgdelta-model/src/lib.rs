//! Shared data model for kgdelta.
//!
//! This crate holds the vocabulary the comparison engine speaks:
//!
//! - `term`: RDF-shaped terms (IRIs, blank nodes, literals) as they appear in
//!   variable bindings and entity keys.
//! - `aspect`: entity-type definitions with one extraction pattern per
//!   dataset and the variables that pattern covers.
//! - `measure`: per-dataset and per-dataset-pair accumulators plus the typed
//!   quality measurements they are published as.
//! - `finding`: deviation/omission/duplicate/issue annotations and their
//!   append-only per-dataset sinks.
//! - `error`: the configuration-time error taxonomy.
//!
//! Everything here is inert data; the algorithms live in `kgdelta-engine`
//! and `kgdelta-compare`.

pub mod aspect;
pub mod error;
pub mod finding;
pub mod measure;
pub mod term;

pub use aspect::{Aspect, AspectId, AspectPattern, AspectRegistry};
pub use error::ConfigurationError;
pub use finding::{Finding, FindingStore, WrongValueRegistry};
pub use measure::{
    div_scaled, round_scaled, DatasetPair, DatasetTupel, MeasurementKind, MeasurementStore,
    PerDatasetCount, PerDatasetPairCount, PerDatasetRatio, PerTupelRatio, QualityMeasurement,
    Unit, SCALE,
};
pub use term::{EntityTerm, Literal, Value};

use serde::{Deserialize, Serialize};

/// Opaque identifier of one data source. Immutable once referenced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub String);

impl DatasetId {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DatasetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
