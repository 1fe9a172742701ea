//! Core error types

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling the core data model
#[derive(Debug, Error)]
pub enum Error {
    /// Scan arrays disagree on the number of mass stations
    #[error("Scan {scan} has {actual} stations, expected {expected}")]
    ScanShape {
        scan: usize,
        expected: usize,
        actual: usize,
    },

    /// A mass-station label is not present in the run's station map
    #[error("Unresolvable mass station: {0}")]
    UnknownStation(String),

    /// A spot-field accessor key is not recognized
    #[error("Unknown spot field: {0}")]
    UnknownField(String),

    /// A task-metadata key is not recognized
    #[error("Unknown task metadata: {0}")]
    UnknownMetadata(String),
}
