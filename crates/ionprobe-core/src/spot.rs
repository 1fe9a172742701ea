//! Spot (analysis fraction) data model

use crate::error::{Error, Result};
use ahash::AHashMap;

/// One sweep of the mass stations within a spot
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanData {
    /// Normalized peak height per mass station
    pub heights: Vec<f64>,
    /// Fractional (relative) one-sigma uncertainty per mass station
    pub fractional_err: Vec<f64>,
    /// Timestamp (seconds from spot start) at which each station was measured
    pub times: Vec<f64>,
}

/// One analysis spot: an ordered series of scans over the run's mass stations
///
/// Raw scan data is immutable after construction; derived per-expression
/// results accumulate in an internal cache keyed by expression name.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spot {
    /// Analysis label, e.g. "T.1.1"
    pub fraction_id: String,
    /// Acquisition time, hours from session start
    pub hours: f64,
    /// True for reference-material spots, false for unknowns
    pub reference_material: bool,
    /// Excluded spots are dropped from every summary population
    pub excluded: bool,
    scans: Vec<ScanData>,
    /// Expression name -> (value, 1-sigma absolute)
    #[cfg_attr(feature = "serde", serde(skip))]
    results: AHashMap<String, (f64, f64)>,
}

impl Spot {
    /// Create a spot from prepared scans
    ///
    /// Fails if the scans disagree on the number of mass stations or if any
    /// scan's height/error/time arrays have mismatched lengths.
    pub fn new(
        fraction_id: impl Into<String>,
        hours: f64,
        reference_material: bool,
        scans: Vec<ScanData>,
    ) -> Result<Self> {
        let expected = scans.first().map(|s| s.heights.len()).unwrap_or(0);
        for (i, scan) in scans.iter().enumerate() {
            for actual in [scan.heights.len(), scan.fractional_err.len(), scan.times.len()] {
                if actual != expected {
                    return Err(Error::ScanShape {
                        scan: i,
                        expected,
                        actual,
                    });
                }
            }
        }

        Ok(Self {
            fraction_id: fraction_id.into(),
            hours,
            reference_material,
            excluded: false,
            scans,
            results: AHashMap::new(),
        })
    }

    /// Create a spot from raw ion counts, deriving fractional uncertainties
    /// from counting statistics (1/sqrt(N); zero counts carry zero error)
    pub fn from_counts(
        fraction_id: impl Into<String>,
        hours: f64,
        reference_material: bool,
        counts: Vec<Vec<f64>>,
        times: Vec<Vec<f64>>,
    ) -> Self {
        let scans = counts
            .into_iter()
            .zip(times)
            .map(|(heights, times)| {
                let fractional_err = heights
                    .iter()
                    .map(|&n| if n > 0.0 { 1.0 / n.sqrt() } else { 0.0 })
                    .collect();
                ScanData {
                    heights,
                    fractional_err,
                    times,
                }
            })
            .collect();

        // Shapes are consistent by construction
        Self {
            fraction_id: fraction_id.into(),
            hours,
            reference_material,
            excluded: false,
            scans,
            results: AHashMap::new(),
        }
    }

    /// Number of scans acquired for this spot
    pub fn scan_count(&self) -> usize {
        self.scans.len()
    }

    /// Number of mass stations per scan
    pub fn station_count(&self) -> usize {
        self.scans.first().map(|s| s.heights.len()).unwrap_or(0)
    }

    /// The spot's scans, in acquisition order
    pub fn scans(&self) -> &[ScanData] {
        &self.scans
    }

    /// Store a computed (value, 1-sigma absolute) pair for an expression
    pub fn set_result(&mut self, name: &str, value: f64, one_sigma_abs: f64) {
        self.results.insert(name.to_string(), (value, one_sigma_abs));
    }

    /// Look up a previously computed result
    pub fn result_for(&self, name: &str) -> Option<(f64, f64)> {
        self.results.get(name).copied()
    }

    /// Drop a single cached result (the expression went missing or dirty)
    pub fn clear_result(&mut self, name: &str) {
        self.results.remove(name);
    }

    /// Drop every cached result
    pub fn clear_all_results(&mut self) {
        self.results.clear();
    }
}

/// Per-spot scalar fields addressable from expressions
///
/// The accessor catalog is closed: unknown keys are rejected when the
/// expression is constructed, not at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotField {
    /// Acquisition time, hours from session start
    Hours,
    /// Zero-based position of the spot within the evaluated population
    SpotIndex,
    /// Number of scans acquired
    ScanCount,
}

impl SpotField {
    /// Resolve an accessor key
    pub fn from_key(key: &str) -> Result<Self> {
        match key {
            "hours" => Ok(SpotField::Hours),
            "spot_index" => Ok(SpotField::SpotIndex),
            "scan_count" => Ok(SpotField::ScanCount),
            other => Err(Error::UnknownField(other.to_string())),
        }
    }

    /// The accessor key this field answers to
    pub fn key(&self) -> &'static str {
        match self {
            SpotField::Hours => "hours",
            SpotField::SpotIndex => "spot_index",
            SpotField::ScanCount => "scan_count",
        }
    }

    /// Read the field from a spot
    pub fn read(&self, spot: &Spot, spot_index: usize) -> f64 {
        match self {
            SpotField::Hours => spot.hours,
            SpotField::SpotIndex => spot_index as f64,
            SpotField::ScanCount => spot.scan_count() as f64,
        }
    }
}

/// Ordered mass-station labels for a run
///
/// Expressions address stations by index; the map is how task setup resolves
/// human-readable labels ("206Pb", "238U", "254UO") to those indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MassStationMap {
    labels: Vec<String>,
}

impl MassStationMap {
    /// Create a map from labels in detector order
    pub fn new(labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of stations
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when the run has no stations configured
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Station index for a label, if present
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Station index for a label, failing with the unresolved label
    pub fn require(&self, label: &str) -> Result<usize> {
        self.index_of(label)
            .ok_or_else(|| Error::UnknownStation(label.to_string()))
    }

    /// Label at a station index
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }
}
