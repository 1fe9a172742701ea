//! Weighted-mean summary results

/// Result of a summary expression over a population of spots
///
/// `values` is the legacy five-slot layout consumed by report tooling:
/// `[mean, 1-sigma absolute, 1-sigma percent, MSWD, probability-of-fit]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpotSummaryDetails {
    /// Name of the summary expression that produced this
    pub expression_name: String,
    /// [mean, sigma_abs, sigma_pct, mswd, prob]
    pub values: Vec<f64>,
    /// Indices of the spots that formed the population, in session order
    pub spot_indices: Vec<usize>,
    /// Rejection mask, parallel to `spot_indices` (true = rejected)
    pub rejected: Vec<bool>,
    /// False when the statistics were degenerate (singular weights, empty
    /// population) and the numeric slots are placeholders
    pub valid: bool,
}

impl SpotSummaryDetails {
    pub fn new(
        expression_name: impl Into<String>,
        values: Vec<f64>,
        spot_indices: Vec<usize>,
        rejected: Vec<bool>,
        valid: bool,
    ) -> Self {
        Self {
            expression_name: expression_name.into(),
            values,
            spot_indices,
            rejected,
            valid,
        }
    }

    /// An invalid placeholder for a population that produced no statistics
    pub fn invalid(expression_name: impl Into<String>, spot_indices: Vec<usize>) -> Self {
        let n = spot_indices.len();
        Self::new(expression_name, vec![0.0; 5], spot_indices, vec![false; n], false)
    }

    pub fn mean(&self) -> f64 {
        self.values[0]
    }

    pub fn sigma_abs(&self) -> f64 {
        self.values[1]
    }

    pub fn sigma_pct(&self) -> f64 {
        self.values[2]
    }

    pub fn mswd(&self) -> f64 {
        self.values[3]
    }

    pub fn prob(&self) -> f64 {
        self.values[4]
    }

    /// Number of spots retained after rejection
    pub fn included_count(&self) -> usize {
        self.rejected.iter().filter(|&&r| !r).count()
    }

    /// Copy of this summary with one spot's rejection flag changed
    ///
    /// `position` indexes into `spot_indices`. Rejection edits never mutate
    /// in place; vetting layers swap whole summaries.
    pub fn with_rejected(&self, position: usize, rejected: bool) -> Self {
        let mut mask = self.rejected.clone();
        if let Some(slot) = mask.get_mut(position) {
            *slot = rejected;
        }
        Self {
            rejected: mask,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> SpotSummaryDetails {
        SpotSummaryDetails::new(
            "WM_UncorrPbUconst",
            vec![1.8465, 0.0045, 0.245, 1.26, 0.285],
            vec![0, 2, 3, 5],
            vec![false, false, true, false],
            true,
        )
    }

    #[test]
    fn test_accessors() {
        let s = sample();
        assert_eq!(s.mean(), 1.8465);
        assert_eq!(s.sigma_abs(), 0.0045);
        assert_eq!(s.mswd(), 1.26);
        assert_eq!(s.prob(), 0.285);
        assert_eq!(s.included_count(), 3);
    }

    #[test]
    fn test_with_rejected_is_functional() {
        let s = sample();
        let edited = s.with_rejected(0, true);

        assert!(!s.rejected[0], "original must be untouched");
        assert!(edited.rejected[0]);
        assert_eq!(edited.included_count(), 2);
        assert_eq!(edited.spot_indices, s.spot_indices);
    }

    #[test]
    fn test_invalid_placeholder() {
        let s = SpotSummaryDetails::invalid("WM_Empty", vec![1, 4]);
        assert!(!s.valid);
        assert_eq!(s.values, vec![0.0; 5]);
        assert_eq!(s.rejected, vec![false, false]);
    }
}
