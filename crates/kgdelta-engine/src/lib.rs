//! Correspondence engine for kgdelta.
//!
//! Maintains the entity-identity relation across datasets:
//!
//! - `interner`: maps entity terms to dense internal ids, so blank-node-like
//!   entities with no printable identity still get a stable identity.
//! - `correspondence`: the monotone fact store (positive/negative pairs) and
//!   the equivalence-class views derived from it on demand.
//! - `matcher`: the narrow contract to the external pattern-matching layer,
//!   plus an in-memory table-backed implementation for tests and plans.
//!
//! Facts accumulate monotonically within one pipeline run; class views are
//! recomputed from the fact set whenever a comparator needs them, never
//! cached across insertions.

pub mod correspondence;
pub mod interner;
pub mod matcher;
mod union_find;

pub use correspondence::CorrespondenceStore;
pub use interner::{EntityId, EntityInterner};
pub use matcher::{PatternMatcher, TableMatcher, ValuesByVariable};
