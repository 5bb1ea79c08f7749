//! Configuration-time errors.
//!
//! Contradicting correspondence assertions and malformed values are *not*
//! errors: the former are rejected silently, the latter become `Issue`
//! findings. Only configuration problems abort processing.

use crate::{AspectId, DatasetId};

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no pattern defined for aspect {aspect} and dataset {dataset}")]
    MissingPattern {
        aspect: AspectId,
        dataset: DatasetId,
    },

    #[error("duplicate pattern defined for aspect {aspect} and dataset {dataset}")]
    DuplicatePattern {
        aspect: AspectId,
        dataset: DatasetId,
    },

    #[error("unknown aspect {0}")]
    UnknownAspect(AspectId),

    #[error("aspect {0} defined twice")]
    DuplicateAspect(AspectId),

    #[error("invalid parameter `{parameter}`: {reason}")]
    InvalidParameter { parameter: String, reason: String },
}
