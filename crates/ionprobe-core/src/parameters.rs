//! Parameter models: decay constants, common lead, reference materials
//!
//! Every evaluation receives an explicit [`ParameterContext`]; there is no
//! ambient global state. Contexts are cheap to clone and swap, so callers can
//! re-reduce the same session under alternative models.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// A physical parameter: value plus one-sigma absolute uncertainty
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterValue {
    pub value: f64,
    pub one_sigma_abs: f64,
}

impl ParameterValue {
    pub fn new(value: f64, one_sigma_abs: f64) -> Self {
        Self {
            value,
            one_sigma_abs,
        }
    }

    /// One-sigma uncertainty as percent of the value (0 when the value is 0)
    pub fn one_sigma_pct(&self) -> f64 {
        if self.value == 0.0 {
            0.0
        } else {
            self.one_sigma_abs / self.value.abs() * 100.0
        }
    }
}

/// A named, versioned collection of parameters with optional correlations
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParametersModel {
    pub name: String,
    pub version: String,
    values: BTreeMap<String, ParameterValue>,
    /// Correlation coefficients between named parameters, if published
    correlations: BTreeMap<(String, String), f64>,
}

impl ParametersModel {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            values: BTreeMap::new(),
            correlations: BTreeMap::new(),
        }
    }

    pub fn with_value(
        mut self,
        key: impl Into<String>,
        value: f64,
        one_sigma_abs: f64,
    ) -> Self {
        self.values
            .insert(key.into(), ParameterValue::new(value, one_sigma_abs));
        self
    }

    pub fn with_correlation(
        mut self,
        a: impl Into<String>,
        b: impl Into<String>,
        rho: f64,
    ) -> Self {
        let (a, b) = (a.into(), b.into());
        let key = if a <= b { (a, b) } else { (b, a) };
        self.correlations.insert(key, rho);
        self
    }

    pub fn get(&self, key: &str) -> Option<ParameterValue> {
        self.values.get(key).copied()
    }

    /// Correlation between two parameters (0 unless published)
    pub fn correlation(&self, a: &str, b: &str) -> f64 {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.correlations.get(&key).copied().unwrap_or(0.0)
    }

    /// EARTHTIME-style physical constants (Jaffey decay constants,
    /// Hiess 238U/235U)
    pub fn earthtime_physical_constants() -> Self {
        Self::new("EARTHTIME Physical Constants Model", "1.1")
            .with_value("lambda232", 4.9475e-11, 1.1137e-13)
            .with_value("lambda235", 9.8485e-10, 6.7160e-13)
            .with_value("lambda238", 1.55125e-10, 8.3325e-14)
            .with_value("u238_u235", 137.818, 0.0225)
    }

    /// Stacey-Kramers modern common-lead composition
    pub fn stacey_kramers_common_pb() -> Self {
        Self::new("Stacey-Kramers (modern)", "1.0")
            .with_value("common_206_204", 18.700, 0.470)
            .with_value("common_207_204", 15.628, 0.160)
            .with_value("common_208_204", 38.630, 0.980)
    }

    /// Temora-2 zircon reference material (true 206Pb/238U ratio)
    pub fn temora2_reference_material() -> Self {
        Self::new("Temora-2", "1.0").with_value("refmat_206_238", 0.066800, 0.000170)
    }
}

/// The three parameter models an evaluation runs under
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterContext {
    pub physical_constants: ParametersModel,
    pub common_pb: ParametersModel,
    pub reference_material: ParametersModel,
}

impl ParameterContext {
    pub fn new(
        physical_constants: ParametersModel,
        common_pb: ParametersModel,
        reference_material: ParametersModel,
    ) -> Self {
        Self {
            physical_constants,
            common_pb,
            reference_material,
        }
    }
}

impl Default for ParameterContext {
    fn default() -> Self {
        Self::new(
            ParametersModel::earthtime_physical_constants(),
            ParametersModel::stacey_kramers_common_pb(),
            ParametersModel::temora2_reference_material(),
        )
    }
}

/// Task-level metadata addressable from expressions
///
/// Like [`crate::SpotField`], the catalog is closed and keys resolve when the
/// expression is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMetadata {
    Lambda232,
    Lambda235,
    Lambda238,
    U238U235,
    RefMat206238,
    Common206204,
    Common207204,
    Common208204,
}

impl TaskMetadata {
    pub fn from_key(key: &str) -> Result<Self> {
        match key {
            "lambda232" => Ok(TaskMetadata::Lambda232),
            "lambda235" => Ok(TaskMetadata::Lambda235),
            "lambda238" => Ok(TaskMetadata::Lambda238),
            "u238_u235" => Ok(TaskMetadata::U238U235),
            "refmat_206_238" => Ok(TaskMetadata::RefMat206238),
            "common_206_204" => Ok(TaskMetadata::Common206204),
            "common_207_204" => Ok(TaskMetadata::Common207204),
            "common_208_204" => Ok(TaskMetadata::Common208204),
            other => Err(Error::UnknownMetadata(other.to_string())),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            TaskMetadata::Lambda232 => "lambda232",
            TaskMetadata::Lambda235 => "lambda235",
            TaskMetadata::Lambda238 => "lambda238",
            TaskMetadata::U238U235 => "u238_u235",
            TaskMetadata::RefMat206238 => "refmat_206_238",
            TaskMetadata::Common206204 => "common_206_204",
            TaskMetadata::Common207204 => "common_207_204",
            TaskMetadata::Common208204 => "common_208_204",
        }
    }

    /// Read the parameter from the model that owns it
    pub fn read(&self, ctx: &ParameterContext) -> Option<ParameterValue> {
        let model = match self {
            TaskMetadata::Lambda232
            | TaskMetadata::Lambda235
            | TaskMetadata::Lambda238
            | TaskMetadata::U238U235 => &ctx.physical_constants,
            TaskMetadata::RefMat206238 => &ctx.reference_material,
            TaskMetadata::Common206204
            | TaskMetadata::Common207204
            | TaskMetadata::Common208204 => &ctx.common_pb,
        };
        model.get(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_context_resolves_all_metadata() {
        let ctx = ParameterContext::default();
        let all = [
            TaskMetadata::Lambda232,
            TaskMetadata::Lambda235,
            TaskMetadata::Lambda238,
            TaskMetadata::U238U235,
            TaskMetadata::RefMat206238,
            TaskMetadata::Common206204,
            TaskMetadata::Common207204,
            TaskMetadata::Common208204,
        ];

        for meta in all {
            assert!(meta.read(&ctx).is_some(), "missing {:?}", meta);
        }
        assert_eq!(
            TaskMetadata::Lambda238.read(&ctx).unwrap().value,
            1.55125e-10
        );
    }

    #[test]
    fn test_metadata_keys_round_trip() {
        for key in ["lambda238", "u238_u235", "refmat_206_238", "common_207_204"] {
            assert_eq!(TaskMetadata::from_key(key).unwrap().key(), key);
        }
        assert!(TaskMetadata::from_key("lambda239").is_err());
    }

    #[test]
    fn test_correlation_is_symmetric() {
        let model = ParametersModel::new("test", "0")
            .with_value("a", 1.0, 0.1)
            .with_value("b", 2.0, 0.2)
            .with_correlation("b", "a", 0.5);

        assert_eq!(model.correlation("a", "b"), 0.5);
        assert_eq!(model.correlation("b", "a"), 0.5);
        assert_eq!(model.correlation("a", "c"), 0.0);
    }

    #[test]
    fn test_sigma_pct() {
        let p = ParameterValue::new(2.0, 0.04);
        assert_eq!(p.one_sigma_pct(), 2.0);
        assert_eq!(ParameterValue::new(0.0, 1.0).one_sigma_pct(), 0.0);
    }
}
