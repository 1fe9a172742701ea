//! Expression evaluator
//!
//! Evaluates expression trees to per-spot scalars. Per-scan evaluation with
//! full error propagation lives in the scan module; it calls back into
//! [`eval`] with a scan-level height environment.

use crate::ast::{BinaryOperator, ExprNode, Expression, UncertaintyDirective};
use crate::operators::{apply_binary, apply_unary};
use ahash::AHashMap;
use ionprobe_core::{
    rounded_to_size, ParameterContext, Spot, SpotSummaryDetails, LEGACY_SIG_FIGS,
};

/// Relative perturbation applied to one input when probing sensitivities
pub(crate) const PERTURBATION_FACTOR: f64 = 1.0001;

/// The relative delta the perturbation factor represents
pub(crate) const PERTURBATION_DELTA: f64 = 1.0e-4;

/// Context for expression evaluation
///
/// Parameters and previously computed summaries are passed in explicitly;
/// the evaluator holds no global state.
pub struct EvaluationContext<'a> {
    pub params: &'a ParameterContext,
    pub summaries: &'a AHashMap<String, SpotSummaryDetails>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        params: &'a ParameterContext,
        summaries: &'a AHashMap<String, SpotSummaryDetails>,
    ) -> Self {
        Self { params, summaries }
    }
}

/// Inputs visible to one tree evaluation
#[derive(Default)]
pub(crate) struct Scope<'a> {
    /// Station index -> interpolated peak height (per-scan evaluation)
    pub heights: Option<&'a AHashMap<usize, f64>>,
    /// The spot under evaluation and its session index
    pub spot: Option<(&'a Spot, usize)>,
    /// Name -> substituted value, used when probing sensitivities
    pub overrides: Option<&'a AHashMap<String, f64>>,
}

/// Evaluate a tree to a scalar; never fails
pub(crate) fn eval(node: &ExprNode, scope: &Scope, ctx: &EvaluationContext) -> f64 {
    match node {
        ExprNode::Constant(v) => *v,
        ExprNode::Species(i) => match scope.heights.and_then(|h| h.get(i)) {
            Some(&h) => h,
            None => {
                log::debug!("station {} unavailable in this scope, substituting 0.0", i);
                0.0
            }
        },
        ExprNode::SpotField(field) => match scope.spot {
            Some((spot, index)) => field.read(spot, index),
            None => 0.0,
        },
        ExprNode::TaskMetadata(meta) => {
            meta.read(ctx.params).map(|p| p.value).unwrap_or_else(|| {
                log::debug!("parameter {} missing from context, substituting 0.0", meta.key());
                0.0
            })
        }
        ExprNode::NamedRef { name, directive } => resolve_named(name, *directive, scope, ctx),
        ExprNode::BinaryOp { op, left, right } => {
            let l = eval(left, scope, ctx);
            let r = eval(right, scope, ctx);
            let left_is_species =
                *op == BinaryOperator::Divide && matches!(**left, ExprNode::Species(_));
            apply_binary(*op, l, r, left_is_species)
        }
        ExprNode::UnaryOp { op, operand } => apply_unary(*op, eval(operand, scope, ctx)),
        ExprNode::Function { func, .. } => {
            // Aggregates only make sense at the summary level; as a scalar
            // they read back their own summary's mean
            log::debug!(
                "aggregate {} evaluated in scalar position, substituting 0.0",
                func.name()
            );
            0.0
        }
    }
}

fn resolve_named(
    name: &str,
    directive: Option<UncertaintyDirective>,
    scope: &Scope,
    ctx: &EvaluationContext,
) -> f64 {
    if directive.is_none() {
        if let Some(value) = scope.overrides.and_then(|o| o.get(name)) {
            return *value;
        }
    }

    let pair = scope
        .spot
        .and_then(|(spot, _)| spot.result_for(name))
        .or_else(|| {
            ctx.summaries
                .get(name)
                .filter(|s| s.valid)
                .map(|s| (s.mean(), s.sigma_abs()))
        });

    let (value, sigma) = match pair {
        Some(pair) => pair,
        None => {
            log::debug!("expression '{}' has no result here, substituting 0.0", name);
            return 0.0;
        }
    };

    match directive {
        None => value,
        Some(UncertaintyDirective::Absolute) => sigma,
        Some(UncertaintyDirective::Percent) => {
            if value == 0.0 {
                0.0
            } else {
                sigma / value.abs() * 100.0
            }
        }
    }
}

/// Evaluate a per-spot expression, propagating uncertainty from the named
/// results it reads
///
/// Each referenced result is perturbed by [`PERTURBATION_FACTOR`] in turn;
/// the squared products of relative sensitivity and fractional uncertainty
/// accumulate into the result's fractional variance. References are probed
/// in ascending name order so the accumulation order is reproducible. The
/// returned pair is rounded to [`LEGACY_SIG_FIGS`] significant figures.
pub fn evaluate_for_spot(
    expr: &Expression,
    spot: &Spot,
    spot_index: usize,
    ctx: &EvaluationContext,
) -> (f64, f64) {
    let scope = Scope {
        heights: None,
        spot: Some((spot, spot_index)),
        overrides: None,
    };
    let value = eval(&expr.tree, &scope, ctx);
    if value == 0.0 {
        return (0.0, 0.0);
    }

    let mut names = expr.tree.named_references();
    names.sort();

    let mut fractional_variance = 0.0;
    for name in names {
        let (ref_value, ref_sigma) = match spot.result_for(&name).or_else(|| {
            ctx.summaries
                .get(&name)
                .filter(|s| s.valid)
                .map(|s| (s.mean(), s.sigma_abs()))
        }) {
            Some(pair) => pair,
            None => continue,
        };
        if ref_value == 0.0 || ref_sigma <= 0.0 {
            continue;
        }

        let mut overrides = AHashMap::new();
        overrides.insert(name, ref_value * PERTURBATION_FACTOR);
        let perturbed_scope = Scope {
            heights: None,
            spot: Some((spot, spot_index)),
            overrides: Some(&overrides),
        };
        let perturbed = eval(&expr.tree, &perturbed_scope, ctx);

        let sensitivity = ((perturbed - value) / value) / PERTURBATION_DELTA;
        let term = sensitivity * (ref_sigma / ref_value.abs());
        fractional_variance += term * term;
    }

    (
        rounded_to_size(value, LEGACY_SIG_FIGS),
        rounded_to_size(value.abs() * fractional_variance.sqrt(), LEGACY_SIG_FIGS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::UnaryOperator;
    use ionprobe_core::TaskMetadata;

    fn assert_rel(actual: f64, expected: f64, tol: f64) {
        let scale = expected.abs().max(1e-30);
        assert!(
            ((actual - expected) / scale).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn empty_spot() -> Spot {
        Spot::from_counts("t", 0.0, false, vec![], vec![])
    }

    #[test]
    fn test_named_ref_directives() {
        let params = ParameterContext::default();
        let summaries = AHashMap::new();
        let ctx = EvaluationContext::new(&params, &summaries);

        let mut spot = empty_spot();
        spot.set_result("r", 2.0, 0.04);
        let scope = Scope {
            spot: Some((&spot, 0)),
            ..Scope::default()
        };

        assert_eq!(eval(&ExprNode::named("r"), &scope, &ctx), 2.0);
        let abs = ExprNode::NamedRef {
            name: "r".into(),
            directive: Some(UncertaintyDirective::Absolute),
        };
        assert_eq!(eval(&abs, &scope, &ctx), 0.04);
        let pct = ExprNode::NamedRef {
            name: "r".into(),
            directive: Some(UncertaintyDirective::Percent),
        };
        assert_rel(eval(&pct, &scope, &ctx), 2.0, 1e-14);
    }

    #[test]
    fn test_missing_named_ref_is_zero() {
        let params = ParameterContext::default();
        let summaries = AHashMap::new();
        let ctx = EvaluationContext::new(&params, &summaries);
        let spot = empty_spot();
        let scope = Scope {
            spot: Some((&spot, 0)),
            ..Scope::default()
        };

        assert_eq!(eval(&ExprNode::named("absent"), &scope, &ctx), 0.0);
    }

    #[test]
    fn test_named_ref_falls_back_to_summary() {
        let params = ParameterContext::default();
        let mut summaries = AHashMap::new();
        summaries.insert(
            "wm".to_string(),
            SpotSummaryDetails::new("wm", vec![1.5, 0.03, 2.0, 1.0, 0.5], vec![0], vec![false], true),
        );
        let ctx = EvaluationContext::new(&params, &summaries);
        let spot = empty_spot();
        let scope = Scope {
            spot: Some((&spot, 0)),
            ..Scope::default()
        };

        assert_eq!(eval(&ExprNode::named("wm"), &scope, &ctx), 1.5);
    }

    #[test]
    fn test_evaluate_for_spot_propagates_uncertainty() {
        // age = ln(1 + r) / lambda238, r = 0.21402780214 +/- 0.000918288143917
        let params = ParameterContext::default();
        let summaries = AHashMap::new();
        let ctx = EvaluationContext::new(&params, &summaries);

        let mut spot = empty_spot();
        spot.set_result("206/238", 0.21402780214, 0.000918288143917);

        let age = Expression::per_spot(
            "RawAge206238",
            ExprNode::BinaryOp {
                op: BinaryOperator::Divide,
                left: Box::new(ExprNode::UnaryOp {
                    op: UnaryOperator::Ln,
                    operand: Box::new(ExprNode::BinaryOp {
                        op: BinaryOperator::Add,
                        left: Box::new(ExprNode::Constant(1.0)),
                        right: Box::new(ExprNode::named("206/238")),
                    }),
                }),
                right: Box::new(ExprNode::TaskMetadata(TaskMetadata::Lambda238)),
            },
        );

        let (value, sigma) = evaluate_for_spot(&age, &spot, 0, &ctx);
        assert_rel(value, 1250240732.59, 1e-12);
        assert_rel(sigma, 4876011.50803, 1e-12);
        // Already at twelve significant figures
        assert_eq!(value, rounded_to_size(value, LEGACY_SIG_FIGS));
        assert_eq!(sigma, rounded_to_size(sigma, LEGACY_SIG_FIGS));
    }
}
