//! Error types

use crate::float_types::Real;

/// Invalid construction parameters for a field or a collection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// (InvalidResolution) Every axis needs at least two grid vertices
    #[error("(InvalidResolution) axis {axis} has {value} vertices, at least 2 are required")]
    InvalidResolution { axis: usize, value: usize },
    /// (DegenerateBounds) The bounding volume is empty, inverted or not finite
    #[error("(DegenerateBounds) bounding volume [{mins:?}, {maxs:?}] has no interior")]
    DegenerateBounds { mins: [Real; 3], maxs: [Real; 3] },
    /// (SampleCount) A sample array does not match the grid size
    #[error("(SampleCount) expected {expected} samples for {what}, found {found}")]
    SampleCount {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// (WorkerPool) The worker pool could not be created
    #[error("(WorkerPool) {0}")]
    WorkerPool(String),
}

/// Operation not allowed in the current lifecycle state of the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Weights were frozen and can no longer be changed
    #[error("field weights are frozen")]
    Frozen,
    /// The field must be frozen before it can be optimized against
    #[error("field is not frozen, classify and freeze it before optimizing")]
    NotFrozen,
}

/// Failure while reading or writing the binary layout.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("std::io::Error: {0}")]
    Io(#[from] std::io::Error),
    /// The stream ended before the record was complete
    #[error("stream truncated while reading {0}")]
    Truncated(&'static str),
    /// The stream holds a value that cannot belong to a valid record
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Any error the crate can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
