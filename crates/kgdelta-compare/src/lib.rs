//! Comparators: the statistics and findings producers of kgdelta.
//!
//! - `population`: entity-existence statistics per aspect (counts, coverage,
//!   duplicates, resource omissions, mark-recapture completeness).
//! - `values`: per-variable value statistics (deviations, value omissions,
//!   coverage, completeness) on top of the correspondence engine and the
//!   pattern matcher.
//! - `equivalence`: the pluggable value-equivalence rules (resources via the
//!   correspondence engine, literals via configurable tolerant equality).
//! - `mapping`: correspondence finders that feed new facts back into the
//!   engine before the comparators consume its classes.
//! - `stats`: the shared Lincoln-Petersen completeness estimator.
//!
//! Comparators own their accumulators for the duration of one pass and
//! publish them into the shared measurement/finding sinks at the end; there
//! is no ambient mutable state.

pub mod equivalence;
pub mod mapping;
pub mod population;
pub mod stats;
pub mod values;

pub use equivalence::{lang_matches, LiteralTolerance, ResourceAwareEquivalence, ValueEquivalence};
pub use mapping::{Mapper, ValueMapper};
pub use population::PopulationComparator;
pub use stats::{mark_recapture_completeness, PopulationRounding};
pub use values::{ValueComparator, ValueComparisonConfig};
