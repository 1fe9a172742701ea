//! # ionprobe-stats
//!
//! Statistics for ion-microprobe data reduction:
//! - [`wtd_av_corr`] - weighted mean of correlated observations
//! - [`wtd_lin_regression`] - generalized least-squares line fit
//! - [`wtd_lin_corr`] - the driver that wraps both with MSWD-gated outlier
//!   rejection
//! - [`tukeys_biweight`] - robust location/scale estimator
//! - [`chi_square_tail`] - probability of fit for the observed chi-square
//!
//! All covariance inputs use the sigma-rho convention: one-sigma absolute
//! uncertainties on the diagonal, correlation coefficients off it.

pub mod biweight;
pub mod prob;
pub mod wtd;

mod linalg;

pub use biweight::{median, tukeys_biweight};
pub use prob::chi_square_tail;
pub use wtd::{
    correlations_to_covariances, delete_point, wtd_av_corr, wtd_lin_corr, wtd_lin_regression,
    WtdAvCorrResult, WtdLinCorrResult, WtdLinRegressionResult,
};
