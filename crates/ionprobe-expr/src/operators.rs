//! Scalar operator application
//!
//! Operators never fail: any numeric fault inside an operator substitutes a
//! neutral sentinel (0.0 for values, false for predicates) and the
//! evaluation continues. Substitutions are reported on the `log` facade at
//! debug level so a reduction can be audited without changing its numbers.

use crate::ast::{BinaryOperator, UnaryOperator};
use ionprobe_core::{rounded_to_size, LEGACY_SIG_FIGS};

/// Two values closer than this compare equal
pub const EQUALITY_TOLERANCE: f64 = 1e-12;

/// Apply a binary operator
///
/// `left_is_species` is true when the left operand is a raw peak height, in
/// which case a quotient is clamped to the legacy 12 significant figures.
pub(crate) fn apply_binary(
    op: BinaryOperator,
    left: f64,
    right: f64,
    left_is_species: bool,
) -> f64 {
    let result = match op {
        BinaryOperator::Add => left + right,
        BinaryOperator::Subtract => left - right,
        BinaryOperator::Multiply => left * right,
        BinaryOperator::Divide => {
            if right == 0.0 {
                log::debug!("division by zero, substituting 0.0");
                return 0.0;
            }
            let quotient = left / right;
            if left_is_species {
                rounded_to_size(quotient, LEGACY_SIG_FIGS)
            } else {
                quotient
            }
        }
        BinaryOperator::Pow => left.powf(right),
        BinaryOperator::Equal => {
            return if (left - right).abs() < EQUALITY_TOLERANCE {
                1.0
            } else {
                0.0
            };
        }
        BinaryOperator::GreaterThan => return if left > right { 1.0 } else { 0.0 },
        BinaryOperator::LessThan => return if left < right { 1.0 } else { 0.0 },
    };

    if result.is_finite() {
        result
    } else {
        log::debug!("non-finite result of {:?}, substituting 0.0", op);
        0.0
    }
}

/// Apply a unary operator; domain faults substitute 0.0
pub(crate) fn apply_unary(op: UnaryOperator, value: f64) -> f64 {
    let result = match op {
        UnaryOperator::Exp => value.exp(),
        UnaryOperator::Ln => value.ln(),
        UnaryOperator::Sqrt => value.sqrt(),
    };

    if result.is_finite() {
        result
    } else {
        log::debug!("non-finite result of {:?}({}), substituting 0.0", op, value);
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_divide_by_zero_is_zero() {
        assert_eq!(apply_binary(BinaryOperator::Divide, 5.0, 0.0, false), 0.0);
        assert_eq!(apply_binary(BinaryOperator::Divide, 5.0, 0.0, true), 0.0);
    }

    #[test]
    fn test_species_quotient_is_rounded() {
        // 1/3 carries more precision than 12 significant figures
        let q = apply_binary(BinaryOperator::Divide, 1.0, 3.0, true);
        assert_eq!(q, 0.333333333333);

        let raw = apply_binary(BinaryOperator::Divide, 1.0, 3.0, false);
        assert_eq!(raw, 1.0 / 3.0);
    }

    #[test]
    fn test_equality_tolerance() {
        assert_eq!(apply_binary(BinaryOperator::Equal, 1.0, 1.0 + 1e-13, false), 1.0);
        assert_eq!(apply_binary(BinaryOperator::Equal, 1.0, 1.0 + 1e-11, false), 0.0);
        // NaN never compares equal
        assert_eq!(apply_binary(BinaryOperator::Equal, f64::NAN, f64::NAN, false), 0.0);
    }

    #[test]
    fn test_predicates() {
        assert_eq!(apply_binary(BinaryOperator::GreaterThan, 2.0, 1.0, false), 1.0);
        assert_eq!(apply_binary(BinaryOperator::LessThan, 2.0, 1.0, false), 0.0);
        // Comparisons against NaN are false, not errors
        assert_eq!(apply_binary(BinaryOperator::GreaterThan, f64::NAN, 1.0, false), 0.0);
    }

    #[test]
    fn test_domain_faults_are_zero() {
        assert_eq!(apply_unary(UnaryOperator::Ln, -1.0), 0.0);
        assert_eq!(apply_unary(UnaryOperator::Ln, 0.0), 0.0);
        assert_eq!(apply_unary(UnaryOperator::Sqrt, -4.0), 0.0);
        assert_eq!(apply_binary(BinaryOperator::Pow, -8.0, 0.5, false), 0.0);
        assert_eq!(apply_binary(BinaryOperator::Multiply, 1e308, 1e308, false), 0.0);
    }

    #[test]
    fn test_plain_arithmetic() {
        assert_eq!(apply_binary(BinaryOperator::Add, 2.0, 3.0, false), 5.0);
        assert_eq!(apply_binary(BinaryOperator::Subtract, 2.0, 3.0, false), -1.0);
        assert_eq!(apply_binary(BinaryOperator::Pow, 2.0, 10.0, false), 1024.0);
        assert_eq!(apply_unary(UnaryOperator::Exp, 0.0), 1.0);
    }
}
