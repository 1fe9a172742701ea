//! Built-in expression library
//!
//! The default U-Pb zircon task: raw ratios, the uncorrected calibration
//! constant, an apparent age, and the reference-material weighted mean.
//! Station labels resolve against the run's [`MassStationMap`]; a missing
//! label is a configuration error, reported before any evaluation.

use crate::ast::{
    AggregateFunction, BinaryOperator, ExprNode, Expression, Population, UnaryOperator,
};
use crate::error::EngineResult;
use ionprobe_core::{MassStationMap, TaskMetadata};
use once_cell::sync::Lazy;

/// Raw 206Pb/238U ratio, per scan
pub const R206_238: &str = "206/238";
/// Raw 254UO/238U ratio, per scan
pub const R254_238: &str = "254/238";
/// Uncorrected calibration constant (206/238)/(254/238)^2, per scan
pub const UNCORR_PB_UCONST: &str = "UncorrPb/Uconst";
/// Apparent 206Pb/238U age in years, per spot
pub const RAW_AGE_206_238: &str = "RawAge206238";
/// Weighted mean of the calibration constant over reference materials
pub const WM_UNCORR_PB_UCONST: &str = "WM_UncorrPbUconst";

/// Conventional station layout of a SHRIMP zircon run
pub static DEFAULT_STATIONS: Lazy<MassStationMap> = Lazy::new(|| {
    MassStationMap::new([
        "196Zr2O", "204Pb", "206Pb", "207Pb", "208Pb", "238U", "248ThO", "254UO",
    ])
});

fn divide(left: ExprNode, right: ExprNode) -> ExprNode {
    ExprNode::BinaryOp {
        op: BinaryOperator::Divide,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// The default expression set, resolved against a station map
pub fn builtin_expressions(stations: &MassStationMap) -> EngineResult<Vec<Expression>> {
    let pb206 = stations.require("206Pb")?;
    let u238 = stations.require("238U")?;
    let uo254 = stations.require("254UO")?;

    let r206_238 = divide(ExprNode::Species(pb206), ExprNode::Species(u238));
    let r254_238 = divide(ExprNode::Species(uo254), ExprNode::Species(u238));

    let uncorr = divide(
        r206_238.clone(),
        ExprNode::BinaryOp {
            op: BinaryOperator::Pow,
            left: Box::new(r254_238.clone()),
            right: Box::new(ExprNode::Constant(2.0)),
        },
    );

    let raw_age = divide(
        ExprNode::UnaryOp {
            op: UnaryOperator::Ln,
            operand: Box::new(ExprNode::BinaryOp {
                op: BinaryOperator::Add,
                left: Box::new(ExprNode::Constant(1.0)),
                right: Box::new(ExprNode::named(R206_238)),
            }),
        },
        ExprNode::TaskMetadata(TaskMetadata::Lambda238),
    );

    let wm = ExprNode::Function {
        func: AggregateFunction::WtdAv,
        args: vec![ExprNode::named(UNCORR_PB_UCONST)],
    };

    Ok(vec![
        Expression::per_scan(R206_238, r206_238),
        Expression::per_scan(R254_238, r254_238),
        Expression::per_scan(UNCORR_PB_UCONST, uncorr),
        Expression::per_spot(RAW_AGE_206_238, raw_age),
        Expression::summary(WM_UNCORR_PB_UCONST, wm, Population::ReferenceMaterial),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtins_resolve_against_default_stations() {
        let exprs = builtin_expressions(&DEFAULT_STATIONS).unwrap();
        assert_eq!(exprs.len(), 5);

        for expr in &exprs {
            expr.validate(DEFAULT_STATIONS.len()).unwrap();
        }

        let ratio = exprs.iter().find(|e| e.name == R206_238).unwrap();
        assert_eq!(ratio.tree.render(), "(PK[2] / PK[5])");
        assert!(ratio.eval_per_scan);
    }

    #[test]
    fn test_missing_station_is_configuration_error() {
        let map = MassStationMap::new(["206Pb", "238U"]);
        let err = builtin_expressions(&map).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unresolvable mass station: 254UO"
        );
    }
}
