//! Engine error types
//!
//! Only configuration problems surface as errors. Per-datum numeric faults
//! (division by zero, domain errors, missing references) substitute neutral
//! sentinels instead; see the operator module.

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors raised while configuring or ordering expressions
#[derive(Debug, Error)]
pub enum EngineError {
    /// An expression participates in a reference cycle
    #[error("Circular reference involving expression '{0}'")]
    CircularDependency(String),

    /// A requested expression is not registered
    #[error("Unknown expression: {0}")]
    UnknownExpression(String),

    /// An expression addresses a mass station the run does not have
    #[error("Expression '{expression}' uses station {station}, run has {stations}")]
    SpeciesOutOfRange {
        expression: String,
        station: usize,
        stations: usize,
    },

    /// An expression is structurally unusable for its declared role
    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// Core data-model error (station labels, accessor keys)
    #[error(transparent)]
    Core(#[from] ionprobe_core::Error),
}
