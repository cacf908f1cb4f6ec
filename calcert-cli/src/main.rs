//! calcert - Calibration certificate calculator
//!
//! Loads a session file, computes per-point accuracy and precision, prints a
//! certificate table and optionally exports the certificate draft as JSON.
//!
//! **Usage:**
//! ```bash
//! calcert session.toml [--config <file>] [--temperature <C>] [--unit <ul|ml>] [--export <file>]
//! ```

mod report;

use anyhow::{Context, Result};
use calcert_common::certificate::{CertificateDraft, CertificateMetadata, DecimalStyle};
use calcert_common::config::{load_config_with_source, ConfigSource};
use calcert_common::session_file::SessionFile;
use calcert_common::statistics::{AmbientCondition, VolumeUnit};
use clap::Parser;
use report::CliFormatter;
use std::path::PathBuf;
use tracing::{info, warn};

/// Calibration certificate calculator
#[derive(Parser, Debug)]
#[clap(name = "calcert")]
#[clap(about = "Compute pipette calibration statistics from a session file")]
struct Args {
    /// Session file (TOML)
    #[clap(value_name = "SESSION")]
    session: PathBuf,

    /// Config file (overrides CALCERT_CONFIG and the user config directory)
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the ambient temperature from the session file (°C)
    #[clap(long)]
    temperature: Option<f64>,

    /// Override the relative humidity from the session file (%)
    #[clap(long)]
    humidity: Option<f64>,

    /// Override the volume unit of every point (ul or ml)
    #[clap(long, value_name = "UNIT", value_parser = parse_unit)]
    unit: Option<VolumeUnit>,

    /// Print '.' as decimal separator instead of the configured style
    #[clap(long)]
    point_decimals: bool,

    /// Export certificate draft to JSON file
    #[clap(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

fn parse_unit(label: &str) -> std::result::Result<VolumeUnit, String> {
    VolumeUnit::from_label(label).ok_or_else(|| format!("unknown volume unit '{}' (use ul or ml)", label))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Config picks the log level, so its outcome is reported once logging is up
    let (config, config_source) = load_config_with_source(args.config.as_deref());

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting calcert v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let ConfigSource::Fallback { reason, .. } = &config_source {
        warn!("{}; using defaults", reason);
    }
    info!("Config: {}", config_source);

    let file = SessionFile::load(&args.session)
        .with_context(|| format!("Failed to load session file {}", args.session.display()))?;
    let mut session = file
        .into_session(&config.defaults)
        .context("Session file describes an invalid instrument layout")?;

    if args.temperature.is_some() || args.humidity.is_some() {
        let current = *session.ambient();
        let ambient = AmbientCondition::new(
            args.temperature.unwrap_or(current.temperature_celsius),
            args.humidity.unwrap_or(current.relative_humidity_percent),
        );
        info!(
            "Ambient override: {} °C, {} %RH",
            ambient.temperature_celsius, ambient.relative_humidity_percent
        );
        session.set_ambient(ambient);
    }

    if let Some(unit) = args.unit {
        info!("Unit override: {}", unit);
        session.set_unit(unit);
    }

    let style = if args.point_decimals {
        DecimalStyle::Point
    } else {
        config.defaults.decimal_style
    };
    let metadata = file
        .certificate
        .clone()
        .unwrap_or_else(CertificateMetadata::untitled);
    let draft = CertificateDraft::build(&session, metadata, style);

    print!("{}", CliFormatter::format_header(&draft));
    print!("{}", CliFormatter::format_rows(&draft));
    print!("{}", CliFormatter::format_incomplete(&draft));

    if let Some(export_path) = &args.export {
        draft
            .export_json(export_path)
            .with_context(|| format!("Failed to export draft to {}", export_path.display()))?;
        println!("\n✓ Draft exported to: {}", export_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit() {
        assert_eq!(parse_unit("mL"), Ok(VolumeUnit::Milliliter));
        assert_eq!(parse_unit("ul"), Ok(VolumeUnit::Microliter));
        assert!(parse_unit("gallon").is_err());
    }

    #[test]
    fn test_unit_flag() {
        let args = Args::try_parse_from(["calcert", "s.toml", "--unit", "ml"]).unwrap();
        assert_eq!(args.unit, Some(VolumeUnit::Milliliter));
        assert!(Args::try_parse_from(["calcert", "s.toml", "--unit", "l"]).is_err());
    }
}
