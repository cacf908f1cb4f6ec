//! Integration tests for session file loading and replay

use calcert_common::certificate::{CertificateDraft, DecimalStyle};
use calcert_common::config::SessionDefaults;
use calcert_common::reorganizer::{ChannelCount, InstrumentKind, PointRef};
use calcert_common::session_file::SessionFile;
use calcert_common::statistics::VolumeUnit;
use calcert_common::Error;
use std::io::Write;
use tempfile::NamedTempFile;

fn ch(channel: u32, position: u32) -> PointRef {
    PointRef::Channel { channel, position }
}

#[test]
fn test_single_channel_session() {
    let file = SessionFile::parse(
        r#"
        [ambient]
        temperature_celsius = 26.2

        [instrument]
        kind = "single_channel"

        [[instrument.points]]
        nominal_volume = "100,0"
        measurements = "99.4, 99.5"

        [[instrument.points]]
        nominal_volume = "500"
        measurements = [495.6, 495.7]
        "#,
    )
    .unwrap();

    let session = file.into_session(&SessionDefaults::default()).unwrap();
    assert_eq!(session.z_factor(), 1.0043);
    assert_eq!(session.ambient().relative_humidity_percent, 50.0);
    assert_eq!(session.unit(), VolumeUnit::Microliter);

    let first = session.point(PointRef::Single { index: 0 }).unwrap().stats();
    assert_eq!(first.mean_volume, Some(99.88));
    assert_eq!(first.accuracy_percent, Some(-0.12));
    assert_eq!(first.coefficient_of_variation, Some(0.07));

    let second = session.point(PointRef::Single { index: 1 }).unwrap().stats();
    assert_eq!(second.mean_volume, Some(497.78));
    assert_eq!(second.accuracy, Some(-2.22));
    assert_eq!(second.accuracy_percent, Some(-0.44));
}

#[test]
fn test_multi_channel_session_fans_out_master() {
    let file = SessionFile::parse(
        r#"
        unit = "ul"

        [ambient]
        temperature_celsius = 20.0
        relative_humidity_percent = 48.0

        [instrument]
        kind = "multi_channel"
        channel_count = 8

        [[instrument.points]]
        channel = 4
        position = 2
        nominal_volume = "55"

        [[instrument.points]]
        channel = 1
        position = 2
        nominal_volume = "50"
        measurements = "49.9, 50.1"

        [[instrument.points]]
        channel = 10
        position = 1
        measurements = "9.9"
        "#,
    )
    .unwrap();

    let session = file.into_session(&SessionDefaults::default()).unwrap();
    assert_eq!(
        session.instrument().kind(),
        InstrumentKind::MultiChannel(ChannelCount::Eight)
    );
    assert_eq!(session.instrument().channel_total(), 10);

    // Fan-out reached every channel, but the explicit channel 4 value wins
    assert_eq!(session.point(ch(2, 2)).unwrap().nominal_volume(), "50");
    assert_eq!(session.point(ch(4, 2)).unwrap().nominal_volume(), "55");
    // Channels added while replaying inherit the master nominal
    assert_eq!(session.point(ch(10, 2)).unwrap().nominal_volume(), "50");
    assert_eq!(session.point(ch(10, 1)).unwrap().stats().mean_mass, Some(9.9));
}

#[test]
fn test_repeater_session_and_certificate() {
    let file = SessionFile::parse(
        r#"
        unit = "ml"

        [ambient]
        temperature_celsius = 23.0

        [certificate]
        certificate_number = "CC-7"
        client_name = "Hospital Norte"
        calibration_date = "2024-06-01"

        [certificate.equipment]
        description = "Repeater pipette"
        brand = "Acme"

        [instrument]
        kind = "repeater"

        [[instrument.syringes]]
        nominal_volume = "5"

        [[instrument.syringes.points]]
        measurements = "4.98, 5.01, 4.99"

        [[instrument.syringes.points]]
        nominal_volume = "0,5"
        measurements = "0.49, 0.5"

        [[instrument.syringes]]
        nominal_volume = "10"
        "#,
    )
    .unwrap();

    let session = file.into_session(&SessionDefaults::default()).unwrap();
    assert_eq!(session.instrument().points_with_refs().len(), 3);

    let first = session.point(PointRef::Syringe { syringe: 0, point: 0 }).unwrap();
    assert_eq!(first.nominal_volume(), "5");
    assert!(first.stats().accuracy.is_some());

    let metadata = file.certificate.clone().unwrap();
    let draft = CertificateDraft::build(&session, metadata, DecimalStyle::Comma);
    assert_eq!(draft.metadata.client_name, "Hospital Norte");
    assert_eq!(draft.rows[1].nominal_volume, "0,50");
    assert_eq!(draft.rows[1].unit, VolumeUnit::Milliliter);
    assert_eq!(draft.incomplete.len(), 1);
    assert_eq!(draft.incomplete[0].label, "Syringe 2 (10 mL) / Point 1");
}

#[test]
fn test_reading_arrays_fill_slots() {
    let file = SessionFile::parse(
        r#"
        [ambient]
        temperature_celsius = 20.0

        [instrument]
        kind = "single_channel"

        [[instrument.points]]
        nominal_volume = "-100"
        measurements = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        "#,
    )
    .unwrap();

    let session = file.into_session(&SessionDefaults::default()).unwrap();
    let point = session.point(PointRef::Single { index: 0 }).unwrap();
    assert_eq!(point.raw_measurements().len(), 10);
    assert_eq!(point.raw_measurements()[0], "1");
    assert_eq!(point.stats().mean_mass, Some(5.5));
    assert_eq!(point.nominal_volume(), "-100");
    assert_eq!(point.stats().accuracy, None);
}

#[test]
fn test_invalid_channel_count_is_parse_error() {
    let err = SessionFile::parse(
        r#"
        [ambient]
        temperature_celsius = 20.0

        [instrument]
        kind = "multi_channel"
        channel_count = 6
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_out_of_range_position_is_not_found() {
    let file = SessionFile::parse(
        r#"
        [ambient]
        temperature_celsius = 20.0

        [instrument]
        kind = "multi_channel"
        channel_count = 12

        [[instrument.points]]
        channel = 1
        position = 4
        measurements = "10"
        "#,
    )
    .unwrap();

    let err = file.into_session(&SessionDefaults::default()).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_load_from_disk() {
    let mut tmp = NamedTempFile::new().unwrap();
    writeln!(
        tmp,
        "[ambient]\ntemperature_celsius = 15.0\n\n[instrument]\nkind = \"single_channel\"\n"
    )
    .unwrap();

    let file = SessionFile::load(tmp.path()).unwrap();
    let session = file.into_session(&SessionDefaults::default()).unwrap();
    assert_eq!(session.z_factor(), 1.0020);
    assert_eq!(session.instrument().points_with_refs().len(), 1);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = SessionFile::load(std::path::Path::new("/nonexistent/session.toml")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
