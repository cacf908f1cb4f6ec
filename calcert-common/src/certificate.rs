//! Certificate data assembly
//!
//! Turns a filled-in calibration session into the rows printed on a
//! certificate. Every number is already rounded and formatted; the document
//! renderer only lays them out.

use crate::input::parse_decimal;
use crate::reorganizer::{CalibrationSession, Instrument, PointRef};
use crate::statistics::{CalibrationPoint, VolumeUnit, STAT_DISPLAY_PLACES};
use crate::zfactor::{display_z_factor, Z_FACTOR_DISPLAY_PLACES};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Placeholder printed for values that could not be computed
pub const MISSING_VALUE: &str = "-";

/// Decimal separator used in formatted values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecimalStyle {
    /// `99,88` (certificate default)
    #[default]
    Comma,
    /// `99.88`
    Point,
}

impl DecimalStyle {
    fn separator(&self) -> char {
        match self {
            DecimalStyle::Comma => ',',
            DecimalStyle::Point => '.',
        }
    }
}

/// Format an optional value with a fixed number of decimals
///
/// # Examples
///
/// ```
/// use calcert_common::certificate::{format_decimal, DecimalStyle};
///
/// assert_eq!(format_decimal(Some(-0.12), 2, DecimalStyle::Comma), "-0,12");
/// assert_eq!(format_decimal(Some(1.0029), 4, DecimalStyle::Point), "1.0029");
/// assert_eq!(format_decimal(None, 2, DecimalStyle::Comma), "-");
/// ```
pub fn format_decimal(value: Option<f64>, places: u32, style: DecimalStyle) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let text = format!("{:.*}", places as usize, v);
            match style {
                DecimalStyle::Point => text,
                DecimalStyle::Comma => text.replace('.', ","),
            }
        }
        _ => MISSING_VALUE.to_string(),
    }
}

/// Descriptive fields entered for the certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub certificate_number: String,
    pub client_name: String,
    pub equipment: EquipmentInfo,
    pub calibration_date: NaiveDate,
    #[serde(default)]
    pub technician: Option<String>,
}

impl CertificateMetadata {
    /// Placeholder fields for a draft printed before the certificate is registered
    pub fn untitled() -> Self {
        Self {
            certificate_number: "DRAFT".to_string(),
            client_name: String::new(),
            equipment: EquipmentInfo::default(),
            calibration_date: Utc::now().date_naive(),
            technician: None,
        }
    }
}

/// Instrument under calibration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EquipmentInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub serial_number: String,
}

/// Ambient block printed in the certificate header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientBlock {
    pub temperature_celsius: String,
    pub relative_humidity_percent: String,
    pub z_factor: String,
}

/// One printed line of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRow {
    pub label: String,
    pub nominal_volume: String,
    pub unit: VolumeUnit,
    /// Valid readings in entry order
    pub readings: Vec<String>,
    pub mean_mass: String,
    pub mean_volume: String,
    pub accuracy: String,
    pub accuracy_percent: String,
    pub standard_deviation: String,
    pub coefficient_of_variation: String,
}

/// Why a point is flagged before emitting a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    NoReadings,
    NoNominalVolume,
}

/// Point the caller should warn about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompletePoint {
    pub label: String,
    pub reason: IncompleteReason,
}

/// Everything a renderer needs to lay out a certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateDraft {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub metadata: CertificateMetadata,
    pub instrument: String,
    pub ambient: AmbientBlock,
    pub rows: Vec<CertificateRow>,
    pub incomplete: Vec<IncompletePoint>,
}

impl CertificateDraft {
    /// Assemble a draft from the current session state
    ///
    /// Incomplete points are listed, not refused.
    pub fn build(
        session: &CalibrationSession,
        metadata: CertificateMetadata,
        style: DecimalStyle,
    ) -> Self {
        let ambient = session.ambient();
        let instrument = session.instrument();

        let mut rows = Vec::new();
        let mut incomplete = Vec::new();
        for (target, point) in instrument.points_with_refs() {
            let label = point_label(instrument, target);
            if point.stats().is_empty() {
                incomplete.push(IncompletePoint {
                    label: label.clone(),
                    reason: IncompleteReason::NoReadings,
                });
            } else if point.nominal_volume_value().filter(|v| *v > 0.0).is_none() {
                incomplete.push(IncompletePoint {
                    label: label.clone(),
                    reason: IncompleteReason::NoNominalVolume,
                });
            }
            rows.push(certificate_row(label, point, style));
        }

        if !incomplete.is_empty() {
            warn!(
                "Certificate {} has {} incomplete point(s)",
                metadata.certificate_number,
                incomplete.len()
            );
        }

        let draft = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            instrument: instrument.label(),
            ambient: AmbientBlock {
                temperature_celsius: format_decimal(Some(ambient.temperature_celsius), 1, style),
                relative_humidity_percent: format_decimal(
                    Some(ambient.relative_humidity_percent),
                    1,
                    style,
                ),
                z_factor: format_decimal(
                    Some(display_z_factor(ambient.z_factor())),
                    Z_FACTOR_DISPLAY_PLACES,
                    style,
                ),
            },
            metadata,
            rows,
            incomplete,
        };

        info!(
            "Assembled certificate {} ({} rows)",
            draft.metadata.certificate_number,
            draft.rows.len()
        );
        draft
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    /// Export draft to JSON file
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Import draft from JSON file
    pub fn import_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let draft: CertificateDraft = serde_json::from_reader(file)?;
        Ok(draft)
    }
}

/// Human label for a point, e.g. `Channel 2 / Point 3`
pub fn point_label(instrument: &Instrument, target: PointRef) -> String {
    match (instrument, target) {
        (_, PointRef::Single { index }) => format!("Point {}", index + 1),
        (_, PointRef::Channel { channel, position }) => {
            format!("Channel {} / Point {}", channel, position)
        }
        (Instrument::Repeater { syringes }, PointRef::Syringe { syringe, point }) => {
            match syringes.get(syringe) {
                Some(s) if !s.nominal_volume.is_empty() => {
                    let unit = s.points.first().map(|p| p.unit()).unwrap_or_default();
                    format!(
                        "Syringe {} ({} {}) / Point {}",
                        syringe + 1,
                        s.nominal_volume,
                        unit,
                        point + 1
                    )
                }
                _ => format!("Syringe {} / Point {}", syringe + 1, point + 1),
            }
        }
        (_, PointRef::Syringe { syringe, point }) => {
            format!("Syringe {} / Point {}", syringe + 1, point + 1)
        }
    }
}

fn certificate_row(label: String, point: &CalibrationPoint, style: DecimalStyle) -> CertificateRow {
    let stats = point.stats();
    let fmt = |value: Option<f64>| format_decimal(value, STAT_DISPLAY_PLACES, style);

    let readings = point
        .raw_measurements()
        .iter()
        .filter(|entry| parse_decimal(entry).is_some())
        .map(|entry| entry.replace('.', &style.separator().to_string()))
        .collect();

    CertificateRow {
        label,
        nominal_volume: fmt(point.nominal_volume_value()),
        unit: point.unit(),
        readings,
        mean_mass: fmt(stats.mean_mass),
        mean_volume: fmt(stats.mean_volume),
        accuracy: fmt(stats.accuracy),
        accuracy_percent: fmt(stats.accuracy_percent),
        standard_deviation: fmt(stats.standard_deviation),
        coefficient_of_variation: fmt(stats.coefficient_of_variation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reorganizer::{ChannelCount, InstrumentKind};
    use crate::statistics::AmbientCondition;

    fn metadata() -> CertificateMetadata {
        CertificateMetadata {
            certificate_number: "CC-0042".to_string(),
            client_name: "Lab Central".to_string(),
            equipment: EquipmentInfo {
                description: "Micropipette".to_string(),
                brand: "Acme".to_string(),
                model: "P100".to_string(),
                serial_number: "SN123".to_string(),
            },
            calibration_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            technician: None,
        }
    }

    #[test]
    fn test_format_decimal_styles() {
        assert_eq!(format_decimal(Some(99.88), 2, DecimalStyle::Comma), "99,88");
        assert_eq!(format_decimal(Some(0.0), 2, DecimalStyle::Comma), "0,00");
        assert_eq!(format_decimal(Some(22.5), 1, DecimalStyle::Point), "22.5");
        assert_eq!(format_decimal(Some(f64::NAN), 2, DecimalStyle::Point), MISSING_VALUE);
    }

    #[test]
    fn test_single_channel_draft() {
        let mut session = CalibrationSession::new(
            AmbientCondition::new(26.0, 55.0),
            VolumeUnit::Microliter,
        );
        let first = PointRef::Single { index: 0 };
        session.set_nominal_volume(first, "100").unwrap();
        session.set_measurements(first, "99.4, 99.5").unwrap();

        let draft = CertificateDraft::build(&session, metadata(), DecimalStyle::Comma);

        assert!(draft.is_complete());
        assert_eq!(draft.instrument, "single-channel pipette");
        assert_eq!(draft.ambient.z_factor, "1,0043");
        assert_eq!(draft.ambient.temperature_celsius, "26,0");

        let row = &draft.rows[0];
        assert_eq!(row.label, "Point 1");
        assert_eq!(row.nominal_volume, "100,00");
        assert_eq!(row.readings, vec!["99,4", "99,5"]);
        assert_eq!(row.mean_volume, "99,88");
        assert_eq!(row.accuracy, "-0,12");
        assert_eq!(row.standard_deviation, "0,07");
    }

    #[test]
    fn test_incomplete_points_are_listed() {
        let mut session = CalibrationSession::new(AmbientCondition::default(), VolumeUnit::Microliter);
        session.select_instrument(InstrumentKind::MultiChannel(ChannelCount::Eight));
        session
            .set_measurements(PointRef::Channel { channel: 2, position: 1 }, "10.0")
            .unwrap();

        let draft = CertificateDraft::build(&session, metadata(), DecimalStyle::Point);

        assert_eq!(draft.instrument, "8-channel pipette");
        assert_eq!(draft.rows.len(), 24);
        assert_eq!(draft.incomplete.len(), 24);
        let flagged = draft
            .incomplete
            .iter()
            .find(|p| p.label == "Channel 2 / Point 1")
            .unwrap();
        assert_eq!(flagged.reason, IncompleteReason::NoNominalVolume);
        assert_eq!(draft.rows[3].accuracy, MISSING_VALUE);
        assert_eq!(draft.rows[3].mean_mass, "10.00");
    }

    #[test]
    fn test_syringe_labels() {
        let mut session = CalibrationSession::new(AmbientCondition::default(), VolumeUnit::Milliliter);
        session.select_instrument(InstrumentKind::Repeater);
        let syringe = session.add_syringe("2,5").unwrap();
        session.add_syringe_point(syringe).unwrap();

        let draft = CertificateDraft::build(&session, metadata(), DecimalStyle::Comma);
        assert_eq!(draft.rows[0].label, "Syringe 1 (2.5 mL) / Point 1");
        assert_eq!(draft.rows[1].label, "Syringe 1 (2.5 mL) / Point 2");
    }

    #[test]
    fn test_json_export_round_trip() {
        let session = CalibrationSession::new(AmbientCondition::default(), VolumeUnit::Microliter);
        let draft = CertificateDraft::build(&session, metadata(), DecimalStyle::Comma);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        draft.export_json(&path).unwrap();

        let loaded = CertificateDraft::import_json(&path).unwrap();
        assert_eq!(loaded, draft);
    }
}
