//! # ionprobe-core
//!
//! Core data structures for the ionprobe data-reduction library.
//!
//! This crate provides the fundamental types used throughout ionprobe:
//! - [`Spot`] and [`ScanData`] - One analysis spot with its per-scan ion counts
//! - [`MassStationMap`] - Ordered mass-station labels for a run
//! - [`ParametersModel`] and [`ParameterContext`] - Decay constants, common-lead
//!   and reference-material models
//! - [`SpotSummaryDetails`] - Result of a weighted-mean summary over a population
//! - [`rounded_to_size`] - Legacy-compatible significant-figure rounding
//!
//! ## Example
//!
//! ```rust
//! use ionprobe_core::Spot;
//!
//! let spot = Spot::from_counts(
//!     "T.1.1",
//!     0.0,
//!     true,
//!     vec![vec![11995.0, 53991.0], vec![11887.0, 54119.0]],
//!     vec![vec![3.0, 7.0], vec![23.0, 27.0]],
//! );
//! assert_eq!(spot.scan_count(), 2);
//! ```

pub mod error;
pub mod parameters;
pub mod rounding;
pub mod spot;
pub mod summary;

// Re-exports for convenience
pub use error::{Error, Result};
pub use parameters::{ParameterContext, ParameterValue, ParametersModel, TaskMetadata};
pub use rounding::{rounded_to_size, ZERO_EPSILON};
pub use spot::{MassStationMap, ScanData, Spot, SpotField};
pub use summary::SpotSummaryDetails;

/// Number of significant figures preserved by intermediate isotopic ratios
/// and final per-spot results
pub const LEGACY_SIG_FIGS: u32 = 12;
