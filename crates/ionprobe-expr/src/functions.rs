//! Population aggregates
//!
//! A summary expression condenses the per-spot results of one named
//! expression over a population of spots into a [`SpotSummaryDetails`]. The
//! aggregate catalog is the closed [`AggregateFunction`] enum; this module
//! holds the implementations.

use crate::ast::AggregateFunction;
use ionprobe_core::{rounded_to_size, SpotSummaryDetails, LEGACY_SIG_FIGS};
use ionprobe_stats::{tukeys_biweight, wtd_lin_corr};

/// Tuning constant for the biweight aggregate
const BIWEIGHT_TUNING: f64 = 9.0;

/// Iteration budget for the biweight aggregate
const BIWEIGHT_ITERATIONS: usize = 100;

impl AggregateFunction {
    /// Aggregate one population
    ///
    /// `values` and `one_sigma_abs` are parallel per-spot results;
    /// `spot_indices` are their session positions. Spots with no result are
    /// excluded by the caller before this point. The mean and sigma slots of
    /// the summary are rounded to [`LEGACY_SIG_FIGS`] significant figures.
    pub fn apply(
        &self,
        expression_name: &str,
        values: &[f64],
        one_sigma_abs: &[f64],
        spot_indices: Vec<usize>,
    ) -> SpotSummaryDetails {
        if values.is_empty() {
            return SpotSummaryDetails::invalid(expression_name, spot_indices);
        }

        match self {
            AggregateFunction::WtdAv => {
                // Spots are independent analyses: diagonal sigma-rho
                let n = values.len();
                let mut sigma_rho = vec![vec![0.0; n]; n];
                for i in 0..n {
                    sigma_rho[i][i] = one_sigma_abs[i];
                }

                let fit = wtd_lin_corr(values, &sigma_rho, None);
                if fit.bad {
                    return SpotSummaryDetails::invalid(expression_name, spot_indices);
                }

                let rejected: Vec<bool> =
                    (0..n).map(|i| fit.rejected.contains(&i)).collect();
                let mean = rounded_to_size(fit.intercept, LEGACY_SIG_FIGS);
                let sigma = rounded_to_size(fit.sigma_intercept, LEGACY_SIG_FIGS);
                let sigma_pct = if mean == 0.0 {
                    0.0
                } else {
                    sigma / mean.abs() * 100.0
                };

                SpotSummaryDetails::new(
                    expression_name,
                    vec![mean, sigma, sigma_pct, fit.mswd, fit.prob],
                    spot_indices,
                    rejected,
                    true,
                )
            }
            AggregateFunction::Biweight => {
                let (location, scale) =
                    tukeys_biweight(values, BIWEIGHT_TUNING, BIWEIGHT_ITERATIONS);
                let location = rounded_to_size(location, LEGACY_SIG_FIGS);
                let scale = rounded_to_size(scale, LEGACY_SIG_FIGS);
                let sigma_pct = if location == 0.0 {
                    0.0
                } else {
                    scale / location.abs() * 100.0
                };
                let n = values.len();

                // The biweight downweights rather than rejects; MSWD and
                // probability slots stay at their degenerate values
                SpotSummaryDetails::new(
                    expression_name,
                    vec![location, scale, sigma_pct, 0.0, 1.0],
                    spot_indices,
                    vec![false; n],
                    true,
                )
            }
        }
    }
}
