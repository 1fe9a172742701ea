//! Per-spot-per-scan evaluation with error propagation
//!
//! A per-scan expression is evaluated once per adjacent scan pair on peak
//! heights interpolated to the pair's equivalent time. Each pair's
//! fractional uncertainty is assembled by perturbing the referenced stations
//! one at a time; adjacent retained pairs share scans and carry a fixed
//! correlation. The pair series then condenses to a single spot value via
//! the correlated weighted mean or a line fit against equivalent time.

use crate::ast::{Expression, SpotFit};
use crate::evaluator::{eval, EvaluationContext, Scope, PERTURBATION_DELTA, PERTURBATION_FACTOR};
use ahash::AHashMap;
use ionprobe_core::{rounded_to_size, Spot, LEGACY_SIG_FIGS};
use ionprobe_stats::wtd_lin_corr;

/// Correlation between scan pairs that share a scan
const ADJACENT_PAIR_RHO: f64 = 0.25;

/// A line fit needs more than this many retained pairs; otherwise the
/// weighted mean is used
const MIN_PAIRS_FOR_REGRESSION: usize = 3;

struct PairValue {
    value: f64,
    sigma_abs: f64,
    equivalent_time: f64,
    /// Index of the pair's first scan, for adjacency bookkeeping
    original_index: usize,
}

/// Evaluate a per-scan expression for one spot
///
/// Returns the rounded `(value, one_sigma_abs)` pair, or `None` when every
/// scan pair was unusable (the spot has no result for this expression).
pub fn evaluate_per_scan(
    expr: &Expression,
    spot: &Spot,
    spot_index: usize,
    ctx: &EvaluationContext,
) -> Option<(f64, f64)> {
    let stations = expr.tree.species_references();
    if stations.is_empty() || spot.scan_count() == 0 {
        return None;
    }
    // An aborted acquisition can carry fewer stations than the run's map
    if stations.iter().any(|&i| i >= spot.station_count()) {
        log::debug!(
            "spot {}: expression reads beyond its {} acquired stations, no result",
            spot.fraction_id,
            spot.station_count()
        );
        return None;
    }

    let scans = spot.scans();
    let mut pairs: Vec<PairValue> = Vec::new();

    if scans.len() == 1 {
        // Single scan: no interpolation, uncertainties straight from the scan
        let scan = &scans[0];
        let env: AHashMap<usize, f64> =
            stations.iter().map(|&i| (i, scan.heights[i])).collect();
        let fract_err: AHashMap<usize, f64> =
            stations.iter().map(|&i| (i, scan.fractional_err[i])).collect();

        if let Some((value, sigma_abs)) =
            evaluate_pair(expr, spot, spot_index, ctx, &env, &fract_err)
        {
            let mean_time =
                stations.iter().map(|&i| scan.times[i]).sum::<f64>() / stations.len() as f64;
            pairs.push(PairValue {
                value,
                sigma_abs,
                equivalent_time: mean_time,
                original_index: 0,
            });
        }
    } else {
        for j in 0..scans.len() - 1 {
            let (first, second) = (&scans[j], &scans[j + 1]);

            let t0 = stations.iter().map(|&i| first.times[i]).sum::<f64>()
                / stations.len() as f64;
            let t1 = stations.iter().map(|&i| second.times[i]).sum::<f64>()
                / stations.len() as f64;
            let teq = 0.5 * (t0 + t1);

            let mut env = AHashMap::new();
            let mut fract_err = AHashMap::new();
            let mut usable = true;
            for &i in &stations {
                let dt = second.times[i] - first.times[i];
                if dt <= 0.0 || !first.heights[i].is_finite() || !second.heights[i].is_finite() {
                    usable = false;
                    break;
                }

                let f = (teq - first.times[i]) / dt;
                let height = first.heights[i] + f * (second.heights[i] - first.heights[i]);
                let abs0 = first.fractional_err[i] * first.heights[i].abs();
                let abs1 = second.fractional_err[i] * second.heights[i].abs();
                let abs_interp =
                    (((1.0 - f) * abs0).powi(2) + (f * abs1).powi(2)).sqrt();

                env.insert(i, height);
                fract_err.insert(
                    i,
                    if height == 0.0 { 0.0 } else { abs_interp / height.abs() },
                );
            }
            if !usable {
                log::debug!(
                    "spot {}: scan pair {} unusable, skipping",
                    spot.fraction_id,
                    j
                );
                continue;
            }

            if let Some((value, sigma_abs)) =
                evaluate_pair(expr, spot, spot_index, ctx, &env, &fract_err)
            {
                pairs.push(PairValue {
                    value,
                    sigma_abs,
                    equivalent_time: teq,
                    original_index: j,
                });
            }
        }
    }

    if pairs.is_empty() {
        return None;
    }

    // Sigma-rho over retained pairs: adjacent original indices share a scan
    let m = pairs.len();
    let mut sigma_rho = vec![vec![0.0; m]; m];
    for (p, pair) in pairs.iter().enumerate() {
        sigma_rho[p][p] = pair.sigma_abs;
    }
    for p in 0..m.saturating_sub(1) {
        if pairs[p + 1].original_index - pairs[p].original_index == 1 {
            sigma_rho[p][p + 1] = ADJACENT_PAIR_RHO;
            sigma_rho[p + 1][p] = ADJACENT_PAIR_RHO;
        }
    }

    let values: Vec<f64> = pairs.iter().map(|p| p.value).collect();
    let times: Vec<f64> = pairs.iter().map(|p| p.equivalent_time).collect();

    let (value, sigma) = if expr.fit == SpotFit::LinearRegression && m > MIN_PAIRS_FOR_REGRESSION {
        let fit = wtd_lin_corr(&values, &sigma_rho, Some(&times));
        if fit.bad {
            return None;
        }
        // Evaluate the fit at the temporal midpoint of the retained pairs
        let t_mid = 0.5 * (times[0] + times[m - 1]);
        let value = fit.intercept + fit.slope * t_mid;
        let variance = fit.sigma_intercept.powi(2)
            + t_mid * t_mid * fit.sigma_slope.powi(2)
            + 2.0 * t_mid * fit.cov_slope_intercept;
        (value, if variance > 0.0 { variance.sqrt() } else { 0.0 })
    } else {
        let mean = wtd_lin_corr(&values, &sigma_rho, None);
        if mean.bad {
            return None;
        }
        (mean.intercept, mean.sigma_intercept)
    };

    Some((
        rounded_to_size(value, LEGACY_SIG_FIGS),
        rounded_to_size(sigma, LEGACY_SIG_FIGS),
    ))
}

/// Evaluate the tree on one height environment and propagate station
/// uncertainties by perturbation
///
/// Stations are perturbed in ascending index order; each contributes the
/// square of (relative sensitivity x fractional uncertainty) to the pair's
/// fractional variance. A zero or non-finite value makes the pair unusable.
fn evaluate_pair(
    expr: &Expression,
    spot: &Spot,
    spot_index: usize,
    ctx: &EvaluationContext,
    env: &AHashMap<usize, f64>,
    fract_err: &AHashMap<usize, f64>,
) -> Option<(f64, f64)> {
    let scope = Scope {
        heights: Some(env),
        spot: Some((spot, spot_index)),
        overrides: None,
    };
    let value = eval(&expr.tree, &scope, ctx);
    if value == 0.0 || !value.is_finite() {
        return None;
    }

    let mut stations: Vec<usize> = env.keys().copied().collect();
    stations.sort_unstable();

    let mut fractional_variance = 0.0;
    for i in stations {
        let mut perturbed_env = env.clone();
        if let Some(h) = perturbed_env.get_mut(&i) {
            *h *= PERTURBATION_FACTOR;
        }
        let perturbed_scope = Scope {
            heights: Some(&perturbed_env),
            spot: Some((spot, spot_index)),
            overrides: None,
        };
        let perturbed = eval(&expr.tree, &perturbed_scope, ctx);

        let sensitivity = ((perturbed - value) / value) / PERTURBATION_DELTA;
        let term = sensitivity * fract_err[&i];
        fractional_variance += term * term;
    }

    Some((value, value.abs() * fractional_variance.sqrt()))
}
