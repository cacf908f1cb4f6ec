//! Terminal formatting for certificate drafts

use calcert_common::certificate::{CertificateDraft, IncompleteReason};

/// CLI formatter for certificate drafts
pub struct CliFormatter;

impl CliFormatter {
    /// Certificate header: identification, instrument and ambient block
    pub fn format_header(draft: &CertificateDraft) -> String {
        let meta = &draft.metadata;
        let mut output = String::new();

        output.push_str("\n╔════════════════════════════════════════╗\n");
        output.push_str(&format!("║ Certificate {:<27}║\n", meta.certificate_number));
        output.push_str("╚════════════════════════════════════════╝\n");

        if !meta.client_name.is_empty() {
            output.push_str(&format!("Client:      {}\n", meta.client_name));
        }
        let equipment = [
            meta.equipment.description.as_str(),
            meta.equipment.brand.as_str(),
            meta.equipment.model.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
        if !equipment.is_empty() {
            output.push_str(&format!("Equipment:   {}\n", equipment));
        }
        if !meta.equipment.serial_number.is_empty() {
            output.push_str(&format!("Serial:      {}\n", meta.equipment.serial_number));
        }
        output.push_str(&format!("Date:        {}\n", meta.calibration_date));
        if let Some(technician) = &meta.technician {
            output.push_str(&format!("Technician:  {}\n", technician));
        }
        output.push_str(&format!("Instrument:  {}\n", draft.instrument));
        output.push_str(&format!(
            "Ambient:     {} °C, {} %RH, Z = {}\n",
            draft.ambient.temperature_celsius,
            draft.ambient.relative_humidity_percent,
            draft.ambient.z_factor
        ));

        output
    }

    /// Results table, one line per point
    pub fn format_rows(draft: &CertificateDraft) -> String {
        let mut output = String::new();

        output.push_str("\n┌──────────────────────────────┬────────────┬────────────┬──────────┬──────────┬──────────┬──────────┐\n");
        output.push_str("│ Point                        │ Nominal    │ Mean vol.  │ Accuracy │ Acc. %   │ SD       │ CV %     │\n");
        output.push_str("├──────────────────────────────┼────────────┼────────────┼──────────┼──────────┼──────────┼──────────┤\n");

        for row in &draft.rows {
            let nominal = format!("{} {}", row.nominal_volume, row.unit);
            output.push_str(&format!(
                "│ {:<28} │ {:>10} │ {:>10} │ {:>8} │ {:>8} │ {:>8} │ {:>8} │\n",
                row.label,
                nominal,
                row.mean_volume,
                row.accuracy,
                row.accuracy_percent,
                row.standard_deviation,
                row.coefficient_of_variation
            ));
        }

        output.push_str("└──────────────────────────────┴────────────┴────────────┴──────────┴──────────┴──────────┴──────────┘\n");

        output
    }

    /// Warning block listing incomplete points (empty when complete)
    pub fn format_incomplete(draft: &CertificateDraft) -> String {
        if draft.is_complete() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str(&format!(
            "\n⚠ {} incomplete point(s):\n",
            draft.incomplete.len()
        ));
        for point in &draft.incomplete {
            let reason = match point.reason {
                IncompleteReason::NoReadings => "no valid readings",
                IncompleteReason::NoNominalVolume => "no nominal volume",
            };
            output.push_str(&format!("  - {}: {}\n", point.label, reason));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcert_common::certificate::{CertificateMetadata, DecimalStyle};
    use calcert_common::statistics::{AmbientCondition, VolumeUnit};
    use calcert_common::{CalibrationSession, PointRef};

    fn draft(with_readings: bool) -> CertificateDraft {
        let mut session = CalibrationSession::new(AmbientCondition::new(26.0, 55.0), VolumeUnit::Microliter);
        let first = PointRef::Single { index: 0 };
        session.set_nominal_volume(first, "100").unwrap();
        if with_readings {
            session.set_measurements(first, "99.4, 99.5").unwrap();
        }
        let mut metadata = CertificateMetadata::untitled();
        metadata.client_name = "Lab Sul".to_string();
        CertificateDraft::build(&session, metadata, DecimalStyle::Comma)
    }

    #[test]
    fn test_header_contains_ambient_block() {
        let header = CliFormatter::format_header(&draft(true));
        assert!(header.contains("Client:      Lab Sul"));
        assert!(header.contains("26,0 °C, 55,0 %RH, Z = 1,0043"));
        assert!(!header.contains("Serial:"));
    }

    #[test]
    fn test_rows_table() {
        let table = CliFormatter::format_rows(&draft(true));
        assert!(table.contains("Point 1"));
        assert!(table.contains("100,00 µL"));
        assert!(table.contains("99,88"));
        assert!(table.contains("-0,12"));
    }

    #[test]
    fn test_incomplete_block() {
        assert!(CliFormatter::format_incomplete(&draft(true)).is_empty());

        let warning = CliFormatter::format_incomplete(&draft(false));
        assert!(warning.contains("1 incomplete point(s)"));
        assert!(warning.contains("Point 1: no valid readings"));
    }
}
