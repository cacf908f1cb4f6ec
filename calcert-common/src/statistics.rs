//! Per-point calibration statistics
//!
//! Converts gravimetric readings (mg of water) into volumes with the ambient
//! Z-factor and derives accuracy and precision for one calibration point.
//!
//! Conversion is applied to every reading before averaging so the standard
//! deviation is expressed in volume units.

use crate::input::{normalize_decimal_text, parse_decimal, parse_measurement_paste, MAX_MEASUREMENTS};
use crate::zfactor::{resolve_z_factor, FALLBACK_TEMPERATURE_C};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decimal places for every derived statistic
pub const STAT_DISPLAY_PLACES: u32 = 2;

/// Volume unit tag of a calibration point
///
/// Statistics are unit-agnostic: readings in mg pair with µL nominals and
/// readings in g pair with mL nominals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VolumeUnit {
    #[default]
    #[serde(rename = "ul", alias = "uL", alias = "µL")]
    Microliter,
    #[serde(rename = "ml", alias = "mL")]
    Milliliter,
}

impl VolumeUnit {
    /// Parse a unit label (case-insensitive, accepts `u` for `µ`)
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ul" | "µl" | "microliter" | "microlitre" => Some(VolumeUnit::Microliter),
            "ml" | "milliliter" | "millilitre" => Some(VolumeUnit::Milliliter),
            _ => None,
        }
    }

    /// Symbol printed on certificates
    pub fn symbol(&self) -> &'static str {
        match self {
            VolumeUnit::Microliter => "µL",
            VolumeUnit::Milliliter => "mL",
        }
    }
}

impl std::fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Location of a point inside a multi-channel instrument (both 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPlacement {
    pub channel: u32,
    pub position: u32,
}

/// Statistics derived from a point's readings
///
/// Every field is `None` until the point has at least one valid reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedStats {
    /// Mean of valid mass readings (mg)
    pub mean_mass: Option<f64>,
    /// Mean of per-reading converted volumes
    pub mean_volume: Option<f64>,
    /// mean_volume - nominal_volume
    pub accuracy: Option<f64>,
    /// accuracy / nominal_volume × 100
    pub accuracy_percent: Option<f64>,
    /// Sample standard deviation (n - 1) of converted volumes
    pub standard_deviation: Option<f64>,
    /// standard_deviation / mean_volume × 100
    pub coefficient_of_variation: Option<f64>,
}

impl DerivedStats {
    /// True when no statistic could be derived
    pub fn is_empty(&self) -> bool {
        self.mean_mass.is_none()
    }
}

/// One nominal volume tested on an instrument
///
/// Inputs are kept as entered text; derived statistics are recomputed by
/// every mutator and cannot be set directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationPoint {
    nominal_volume: String,
    unit: VolumeUnit,
    raw_measurements: Vec<String>,
    placement: Option<ChannelPlacement>,
    stats: DerivedStats,
}

impl CalibrationPoint {
    /// Create an empty point
    pub fn new(unit: VolumeUnit) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Create an empty point tagged with its channel and position
    pub fn at_placement(unit: VolumeUnit, channel: u32, position: u32) -> Self {
        Self {
            unit,
            placement: Some(ChannelPlacement { channel, position }),
            ..Self::default()
        }
    }

    /// Normalized nominal volume text
    pub fn nominal_volume(&self) -> &str {
        &self.nominal_volume
    }

    /// Nominal volume as a number, if it parses
    pub fn nominal_volume_value(&self) -> Option<f64> {
        parse_decimal(&self.nominal_volume)
    }

    pub fn unit(&self) -> VolumeUnit {
        self.unit
    }

    /// Measurement slots in entry order (at most ten)
    pub fn raw_measurements(&self) -> &[String] {
        &self.raw_measurements
    }

    pub fn placement(&self) -> Option<ChannelPlacement> {
        self.placement
    }

    pub fn stats(&self) -> &DerivedStats {
        &self.stats
    }

    /// Number of slots that parse as a reading
    pub fn valid_measurement_count(&self) -> usize {
        self.raw_measurements
            .iter()
            .filter(|entry| parse_decimal(entry).is_some())
            .count()
    }

    /// Set the nominal volume from free text and recompute
    pub fn set_nominal_volume(&mut self, text: &str, z_factor: f64) {
        self.nominal_volume = normalize_decimal_text(text);
        self.recompute(z_factor);
    }

    /// Replace readings from a comma-separated paste and recompute
    pub fn set_measurements(&mut self, text: &str, z_factor: f64) {
        self.raw_measurements = parse_measurement_paste(text);
        self.recompute(z_factor);
    }

    /// Replace readings slot by slot and recompute
    pub fn set_measurement_slots<I, S>(&mut self, slots: I, z_factor: f64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw_measurements = slots
            .into_iter()
            .take(MAX_MEASUREMENTS)
            .map(|s| s.into().trim().to_string())
            .collect();
        self.recompute(z_factor);
    }

    pub fn set_unit(&mut self, unit: VolumeUnit) {
        self.unit = unit;
    }

    pub(crate) fn set_placement(&mut self, placement: ChannelPlacement) {
        self.placement = Some(placement);
    }

    /// Refresh derived statistics for a (possibly new) Z-factor
    pub fn recompute(&mut self, z_factor: f64) {
        self.stats = compute_statistics(self, z_factor);
    }
}

/// Ambient conditions at calibration time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientCondition {
    pub temperature_celsius: f64,
    pub relative_humidity_percent: f64,
}

impl AmbientCondition {
    pub fn new(temperature_celsius: f64, relative_humidity_percent: f64) -> Self {
        Self {
            temperature_celsius,
            relative_humidity_percent,
        }
    }

    /// Z-factor for this temperature
    pub fn z_factor(&self) -> f64 {
        resolve_z_factor(self.temperature_celsius)
    }
}

impl Default for AmbientCondition {
    fn default() -> Self {
        Self::new(FALLBACK_TEMPERATURE_C, 50.0)
    }
}

/// Compute accuracy and precision for one point
///
/// Readings that fail to parse are skipped. With no valid reading every
/// field is `None`. Accuracy fields are `None` unless the nominal volume is
/// a positive number. A single reading has a standard deviation of 0, and
/// the coefficient of variation is 0 when the mean volume is 0. Results are
/// rounded to two decimals from unrounded intermediates.
///
/// # Examples
///
/// ```
/// use calcert_common::statistics::{compute_statistics, CalibrationPoint, VolumeUnit};
///
/// let mut point = CalibrationPoint::new(VolumeUnit::Microliter);
/// point.set_nominal_volume("100,0", 1.0043);
/// point.set_measurements("99.4, 99.5", 1.0043);
///
/// let stats = compute_statistics(&point, 1.0043);
/// assert_eq!(stats.mean_mass, Some(99.45));
/// assert_eq!(stats.mean_volume, Some(99.88));
/// assert_eq!(stats.accuracy, Some(-0.12));
/// ```
pub fn compute_statistics(point: &CalibrationPoint, z_factor: f64) -> DerivedStats {
    let masses: Vec<f64> = point
        .raw_measurements
        .iter()
        .take(MAX_MEASUREMENTS)
        .filter_map(|entry| parse_decimal(entry))
        .collect();

    if masses.is_empty() {
        return DerivedStats::default();
    }

    let n = masses.len() as f64;
    let mean_mass = masses.iter().sum::<f64>() / n;

    let volumes: Vec<f64> = masses.iter().map(|mass| mass * z_factor).collect();
    let mean_volume = volumes.iter().sum::<f64>() / n;

    let nominal = point.nominal_volume_value().filter(|v| *v > 0.0);
    let accuracy = nominal.map(|nominal| mean_volume - nominal);
    let accuracy_percent = nominal
        .zip(accuracy)
        .map(|(nominal, accuracy)| accuracy / nominal * 100.0);

    let standard_deviation = if volumes.len() < 2 {
        0.0
    } else {
        let sum_sq = volumes
            .iter()
            .map(|v| {
                let diff = v - mean_volume;
                diff * diff
            })
            .sum::<f64>();
        (sum_sq / (n - 1.0)).sqrt()
    };

    let coefficient_of_variation = if mean_volume == 0.0 {
        0.0
    } else {
        standard_deviation / mean_volume * 100.0
    };

    debug!(
        readings = masses.len(),
        z_factor, mean_volume, standard_deviation, "Recomputed point statistics"
    );

    DerivedStats {
        mean_mass: round_stat(mean_mass),
        mean_volume: round_stat(mean_volume),
        accuracy: accuracy.and_then(round_stat),
        accuracy_percent: accuracy_percent.and_then(round_stat),
        standard_deviation: round_stat(standard_deviation),
        coefficient_of_variation: round_stat(coefficient_of_variation),
    }
}

/// Round half away from zero to `places` decimals; `-0.0` becomes `0.0`
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn round_stat(value: f64) -> Option<f64> {
    value
        .is_finite()
        .then(|| round_to(value, STAT_DISPLAY_PLACES))
}
