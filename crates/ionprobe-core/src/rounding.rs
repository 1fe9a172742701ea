//! Legacy-compatible significant-figure rounding
//!
//! Intermediate isotopic ratios and final per-spot results are rounded to a
//! fixed number of significant figures with ties rounded away from zero,
//! matching the arbitrary-precision HALF_UP discipline of the system this
//! engine replays. Downstream values are sensitive to this at the last digit,
//! so the rounding goes through [`rust_decimal`] rather than float math.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::RoundingStrategy;

/// Magnitudes below this round to exactly zero
pub const ZERO_EPSILON: f64 = 1e-15;

/// Round `value` to `sig_figs` significant figures, ties away from zero
///
/// Non-finite input and magnitudes below [`ZERO_EPSILON`] produce exactly
/// 0.0. Values outside `Decimal`'s magnitude range fall back to scaled float
/// rounding (f64's `round` also ties away from zero).
pub fn rounded_to_size(value: f64, sig_figs: u32) -> f64 {
    if !value.is_finite() || value.abs() < ZERO_EPSILON {
        return 0.0;
    }

    if let Some(d) = rust_decimal::Decimal::from_f64(value) {
        if let Some(rounded) =
            d.round_sf_with_strategy(sig_figs, RoundingStrategy::MidpointAwayFromZero)
        {
            if let Some(f) = rounded.to_f64() {
                return f;
            }
        }
    }

    let exponent = value.abs().log10().floor() as i32;
    let scale = 10f64.powi(sig_figs as i32 - 1 - exponent);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_rounding() {
        assert_eq!(rounded_to_size(1.23456789, 3), 1.23);
        assert_eq!(rounded_to_size(0.000123456, 2), 0.00012);
        assert_eq!(rounded_to_size(123456.789, 12), 123456.789);
    }

    #[test]
    fn test_ties_round_away_from_zero() {
        assert_eq!(rounded_to_size(2.5, 1), 3.0);
        assert_eq!(rounded_to_size(-2.5, 1), -3.0);
    }

    #[test]
    fn test_carry_across_magnitude() {
        assert_eq!(rounded_to_size(9.999999999999, 3), 10.0);
    }

    #[test]
    fn test_near_zero_and_non_finite() {
        assert_eq!(rounded_to_size(5e-16, 6), 0.0);
        assert_eq!(rounded_to_size(-5e-16, 6), 0.0);
        assert_eq!(rounded_to_size(f64::NAN, 6), 0.0);
        assert_eq!(rounded_to_size(f64::INFINITY, 6), 0.0);
        assert_eq!(rounded_to_size(f64::NEG_INFINITY, 6), 0.0);
    }

    #[test]
    fn test_idempotent() {
        for v in [1.23456789, -0.000987654321, 98765.4321, 2.5] {
            let once = rounded_to_size(v, 12);
            assert_eq!(rounded_to_size(once, 12), once);
        }
    }

    #[test]
    fn test_large_magnitude_fallback() {
        // Outside Decimal's range; the float path takes over
        let v = 1.234567e40;
        let r = rounded_to_size(v, 3);
        assert!((r - 1.23e40).abs() / 1.23e40 < 1e-12);
    }
}
