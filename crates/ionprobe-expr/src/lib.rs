//! # ionprobe-expr
//!
//! Expression trees and dependency-ordered evaluation for ionprobe data
//! reduction.
//!
//! The engine evaluates named expressions over a session of analysis spots:
//! - Per-scan expressions read raw peak heights, are evaluated once per
//!   adjacent scan pair with perturbation-based error propagation, and
//!   condense to a spot value through a correlated weighted mean or a line
//!   fit against equivalent time.
//! - Per-spot expressions combine named results, spot fields and task
//!   parameters.
//! - Summary expressions aggregate a population of spots (weighted mean
//!   with MSWD-gated rejection, or Tukey's biweight).
//!
//! Numeric faults never abort a reduction: operators substitute neutral
//! sentinels and report on the `log` facade. Configuration problems (cycles,
//! unresolvable stations, malformed roles) are real errors, raised before
//! evaluation.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ionprobe_core::{MassStationMap, ParameterContext, Spot};
//! use ionprobe_expr::Session;
//!
//! let spots: Vec<Spot> = Vec::new(); // loaded from a run file
//! let stations = MassStationMap::new(["196Zr2O", "204Pb", "206Pb", "207Pb",
//!                                     "208Pb", "238U", "248ThO", "254UO"]);
//! let mut session =
//!     Session::with_builtins(spots, stations, ParameterContext::default()).unwrap();
//! let stats = session.evaluate_all().unwrap();
//! println!("{} expressions evaluated", stats.expressions_evaluated);
//! ```

pub mod ast;
pub mod builtins;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod operators;
pub mod scan;
pub mod session;

// Re-exports for convenience
pub use ast::{
    AggregateFunction, BinaryOperator, ExprNode, Expression, Population, SpotFit,
    UnaryOperator, UncertaintyDirective,
};
pub use dependency::DependencyGraph;
pub use error::{EngineError, EngineResult};
pub use evaluator::{evaluate_for_spot, EvaluationContext};
pub use operators::EQUALITY_TOLERANCE;
pub use scan::evaluate_per_scan;
pub use session::{EvaluationStats, Session};
