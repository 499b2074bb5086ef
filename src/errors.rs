//! Error types for the aggregation engine.

use std::fmt;
use thiserror::Error;

/// Shape of a field value, used when reporting a type mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// A single categorical answer.
    Scalar,
    /// A multi-select answer.
    Multi,
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueShape::Scalar => write!(f, "scalar"),
            ValueShape::Multi => write!(f, "multi-valued"),
        }
    }
}

/// Failures raised while tabulating records or ranking insights.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("record {record_index} has no field '{field}'")]
    MissingField { field: String, record_index: usize },

    #[error("field '{field}' on record {record_index} is {found}, expected {expected}")]
    TypeMismatch {
        field: String,
        record_index: usize,
        expected: ValueShape,
        found: ValueShape,
    },

    #[error("cannot rank an empty set of entries")]
    EmptyInput,

    #[error("insight pair name '{0}' is configured more than once")]
    DuplicatePairName(String),

    #[error("value '{value}' of field '{field}' contains the composite delimiter '{delimiter}'")]
    DelimiterCollision {
        field: String,
        value: String,
        delimiter: String,
    },

    #[error("composite delimiter must not be empty")]
    EmptyDelimiter,

    #[error("composite key '{key}' does not contain the delimiter '{delimiter}'")]
    MalformedCompositeKey { key: String, delimiter: String },
}

/// Convenience alias used across the engine.
pub type AggregateResult<T> = std::result::Result<T, AggregateError>;
