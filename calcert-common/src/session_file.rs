//! Session files
//!
//! A session file is the TOML form of one filled-in calibration: ambient
//! conditions, the instrument and its readings, and optionally the
//! certificate fields. Loading replays every input through
//! [`CalibrationSession`] so master-channel fan-out and cardinality rules
//! behave exactly as during interactive entry.
//!
//! ```toml
//! [ambient]
//! temperature_celsius = 22.5
//!
//! [instrument]
//! kind = "multi_channel"
//! channel_count = 8
//!
//! [[instrument.points]]
//! channel = 1
//! position = 1
//! nominal_volume = "10"
//! measurements = "9.98, 10.01, 9.99"
//! ```

use crate::certificate::CertificateMetadata;
use crate::config::SessionDefaults;
use crate::reorganizer::{CalibrationSession, ChannelCount, InstrumentKind, PointRef, MASTER_CHANNEL};
use crate::statistics::{AmbientCondition, VolumeUnit};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Highest channel number a session file may address
pub const MAX_CHANNEL_NUMBER: u32 = 96;

/// Parsed session file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    /// Falls back to the configured default unit
    #[serde(default)]
    pub unit: Option<VolumeUnit>,
    pub ambient: AmbientInput,
    pub instrument: InstrumentInput,
    #[serde(default)]
    pub certificate: Option<CertificateMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientInput {
    pub temperature_celsius: f64,
    #[serde(default)]
    pub relative_humidity_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstrumentInput {
    SingleChannel {
        #[serde(default)]
        points: Vec<PointInput>,
    },
    MultiChannel {
        channel_count: ChannelCount,
        #[serde(default)]
        points: Vec<ChannelPointInput>,
    },
    Repeater {
        #[serde(default)]
        syringes: Vec<SyringeInput>,
    },
}

/// Readings as a pasted string or as a TOML array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementsInput {
    Paste(String),
    Readings(Vec<f64>),
}

impl Default for MeasurementsInput {
    fn default() -> Self {
        MeasurementsInput::Paste(String::new())
    }
}

impl MeasurementsInput {
    fn apply(&self, session: &mut CalibrationSession, target: PointRef) -> Result<()> {
        match self {
            MeasurementsInput::Paste(text) => session.set_measurements(target, text),
            MeasurementsInput::Readings(values) => {
                session.set_measurement_slots(target, values.iter().map(|v| v.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointInput {
    #[serde(default)]
    pub nominal_volume: String,
    #[serde(default)]
    pub measurements: MeasurementsInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPointInput {
    pub channel: u32,
    pub position: u32,
    #[serde(default)]
    pub nominal_volume: String,
    #[serde(default)]
    pub measurements: MeasurementsInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyringeInput {
    pub nominal_volume: String,
    /// Points tested on this syringe; the first one defaults to the syringe volume
    #[serde(default)]
    pub points: Vec<PointInput>,
}

impl SessionFile {
    /// Read and parse a session file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file = Self::parse(&content)?;
        info!("Loaded session file {}", path.display());
        Ok(file)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Replay the file into a live session
    pub fn into_session(&self, defaults: &SessionDefaults) -> Result<CalibrationSession> {
        let ambient = AmbientCondition::new(
            self.ambient.temperature_celsius,
            self.ambient
                .relative_humidity_percent
                .unwrap_or(defaults.relative_humidity_percent),
        );
        let unit = self.unit.unwrap_or(defaults.unit);
        let mut session = CalibrationSession::new(ambient, unit);

        match &self.instrument {
            InstrumentInput::SingleChannel { points } => {
                for (index, input) in points.iter().enumerate() {
                    if index > 0 {
                        session.add_point()?;
                    }
                    apply_point(&mut session, PointRef::Single { index }, input)?;
                }
            }
            InstrumentInput::MultiChannel {
                channel_count,
                points,
            } => {
                session.select_instrument(InstrumentKind::MultiChannel(*channel_count));

                // Master entries first so explicit sibling values override the fan-out
                let mut ordered: Vec<&ChannelPointInput> = points.iter().collect();
                ordered.sort_by_key(|p| p.channel != MASTER_CHANNEL);

                for input in ordered {
                    if input.channel == 0 || input.channel > MAX_CHANNEL_NUMBER {
                        return Err(Error::InvalidInput(format!(
                            "channel {} out of range 1..={}",
                            input.channel, MAX_CHANNEL_NUMBER
                        )));
                    }
                    while session.instrument().channel_total() < input.channel {
                        session.add_channel()?;
                    }

                    let target = PointRef::Channel {
                        channel: input.channel,
                        position: input.position,
                    };
                    if !input.nominal_volume.is_empty() {
                        session.set_nominal_volume(target, &input.nominal_volume)?;
                    }
                    input.measurements.apply(&mut session, target)?;
                }
            }
            InstrumentInput::Repeater { syringes } => {
                session.select_instrument(InstrumentKind::Repeater);
                for input in syringes {
                    let syringe = session.add_syringe(&input.nominal_volume)?;
                    for (point, point_input) in input.points.iter().enumerate() {
                        if point > 0 {
                            session.add_syringe_point(syringe)?;
                        }
                        apply_point(
                            &mut session,
                            PointRef::Syringe { syringe, point },
                            point_input,
                        )?;
                    }
                }
            }
        }

        debug!(
            "Session replayed: {}, {} point(s)",
            session.instrument().kind(),
            session.instrument().points_with_refs().len()
        );
        Ok(session)
    }
}

fn apply_point(session: &mut CalibrationSession, target: PointRef, input: &PointInput) -> Result<()> {
    if !input.nominal_volume.is_empty() {
        session.set_nominal_volume(target, &input.nominal_volume)?;
    }
    input.measurements.apply(session, target)
}
