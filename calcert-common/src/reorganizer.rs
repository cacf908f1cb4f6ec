//! Instrument point/channel reorganizer
//!
//! Owns the calibration form state for one certificate and is the only place
//! that knows how points are laid out per instrument type:
//!
//! - Single-channel pipette: a free list of points (at least one)
//! - Multi-channel pipette: whole channels of three points each (at least one
//!   channel); channel 1 is the master channel whose nominal volumes fan out
//! - Repeater: independent syringes, each with its own points (at least one
//!   per syringe)
//!
//! Transitions between instrument types only happen through
//! [`CalibrationSession::select_instrument`] and always rebuild the canonical
//! initial layout.

use crate::statistics::{AmbientCondition, CalibrationPoint, ChannelPlacement, VolumeUnit};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Points per channel on a multi-channel pipette
pub const POINTS_PER_CHANNEL: u32 = 3;

/// Channel whose nominal-volume edits propagate to sibling channels
pub const MASTER_CHANNEL: u32 = 1;

/// Supported multi-channel head sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ChannelCount {
    Eight,
    Twelve,
}

impl ChannelCount {
    pub fn count(&self) -> u32 {
        match self {
            ChannelCount::Eight => 8,
            ChannelCount::Twelve => 12,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            8 => Some(ChannelCount::Eight),
            12 => Some(ChannelCount::Twelve),
            _ => None,
        }
    }
}

impl TryFrom<u32> for ChannelCount {
    type Error = String;

    fn try_from(count: u32) -> std::result::Result<Self, Self::Error> {
        ChannelCount::from_count(count)
            .ok_or_else(|| format!("unsupported channel count {} (expected 8 or 12)", count))
    }
}

impl From<ChannelCount> for u32 {
    fn from(count: ChannelCount) -> Self {
        count.count()
    }
}

/// Instrument type chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    SingleChannel,
    MultiChannel(ChannelCount),
    Repeater,
}

impl std::fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentKind::SingleChannel => write!(f, "single-channel pipette"),
            InstrumentKind::MultiChannel(count) => {
                write!(f, "{}-channel pipette", count.count())
            }
            InstrumentKind::Repeater => write!(f, "repeater"),
        }
    }
}

/// One syringe tip of a repeater with its own points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syringe {
    /// Normalized syringe capacity text
    pub nominal_volume: String,
    pub points: Vec<CalibrationPoint>,
}

/// Address of a point inside the current instrument
///
/// `index`, `syringe` and `point` are 0-based; `channel` and `position`
/// are 1-based as printed on certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointRef {
    Single { index: usize },
    Channel { channel: u32, position: u32 },
    Syringe { syringe: usize, point: usize },
}

impl std::fmt::Display for PointRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointRef::Single { index } => write!(f, "point {}", index + 1),
            PointRef::Channel { channel, position } => {
                write!(f, "channel {} point {}", channel, position)
            }
            PointRef::Syringe { syringe, point } => {
                write!(f, "syringe {} point {}", syringe + 1, point + 1)
            }
        }
    }
}

/// Calibration points laid out for one instrument type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    SingleChannel {
        points: Vec<CalibrationPoint>,
    },
    MultiChannel {
        channel_count: ChannelCount,
        /// Ordered by channel, then position; channels are numbered 1..N without gaps
        points: Vec<CalibrationPoint>,
    },
    Repeater {
        syringes: Vec<Syringe>,
    },
}

impl Instrument {
    /// Canonical initial layout for an instrument type
    pub fn canonical(kind: InstrumentKind, unit: VolumeUnit) -> Self {
        match kind {
            InstrumentKind::SingleChannel => Instrument::SingleChannel {
                points: vec![CalibrationPoint::new(unit)],
            },
            InstrumentKind::MultiChannel(channel_count) => Instrument::MultiChannel {
                channel_count,
                points: (1..=channel_count.count())
                    .flat_map(|channel| channel_points(unit, channel))
                    .collect(),
            },
            InstrumentKind::Repeater => Instrument::Repeater {
                syringes: Vec::new(),
            },
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::SingleChannel { .. } => InstrumentKind::SingleChannel,
            Instrument::MultiChannel { channel_count, .. } => {
                InstrumentKind::MultiChannel(*channel_count)
            }
            Instrument::Repeater { .. } => InstrumentKind::Repeater,
        }
    }

    /// Human-readable instrument description
    ///
    /// Multi-channel pipettes report the channels actually on the form, which
    /// differs from the head size once channels are added or removed.
    pub fn label(&self) -> String {
        match self {
            Instrument::MultiChannel { .. } => {
                format!("{}-channel pipette", self.channel_total())
            }
            _ => self.kind().to_string(),
        }
    }

    /// Current number of channels (0 unless multi-channel)
    pub fn channel_total(&self) -> u32 {
        match self {
            Instrument::MultiChannel { points, .. } => points.len() as u32 / POINTS_PER_CHANNEL,
            _ => 0,
        }
    }

    /// Every point with its address, in display order
    pub fn points_with_refs(&self) -> Vec<(PointRef, &CalibrationPoint)> {
        match self {
            Instrument::SingleChannel { points } => points
                .iter()
                .enumerate()
                .map(|(index, p)| (PointRef::Single { index }, p))
                .collect(),
            Instrument::MultiChannel { points, .. } => points
                .iter()
                .filter_map(|p| {
                    p.placement().map(|placement| {
                        (
                            PointRef::Channel {
                                channel: placement.channel,
                                position: placement.position,
                            },
                            p,
                        )
                    })
                })
                .collect(),
            Instrument::Repeater { syringes } => syringes
                .iter()
                .enumerate()
                .flat_map(|(syringe, s)| {
                    s.points
                        .iter()
                        .enumerate()
                        .map(move |(point, p)| (PointRef::Syringe { syringe, point }, p))
                })
                .collect(),
        }
    }

    /// Look up a point by address
    pub fn point(&self, target: PointRef) -> Option<&CalibrationPoint> {
        match (self, target) {
            (Instrument::SingleChannel { points }, PointRef::Single { index }) => points.get(index),
            (Instrument::MultiChannel { points, .. }, PointRef::Channel { channel, position }) => {
                points.get(channel_index(channel, position)?)
            }
            (Instrument::Repeater { syringes }, PointRef::Syringe { syringe, point }) => {
                syringes.get(syringe)?.points.get(point)
            }
            _ => None,
        }
    }

    fn point_mut(&mut self, target: PointRef) -> Result<&mut CalibrationPoint> {
        let kind = self.kind();
        let found = match (self, target) {
            (Instrument::SingleChannel { points }, PointRef::Single { index }) => {
                points.get_mut(index)
            }
            (Instrument::MultiChannel { points, .. }, PointRef::Channel { channel, position }) => {
                match channel_index(channel, position) {
                    Some(idx) => points.get_mut(idx),
                    None => None,
                }
            }
            (Instrument::Repeater { syringes }, PointRef::Syringe { syringe, point }) => syringes
                .get_mut(syringe)
                .and_then(|s| s.points.get_mut(point)),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "{} does not address a {}",
                    target, kind
                )))
            }
        };

        found.ok_or_else(|| Error::NotFound(target.to_string()))
    }

    fn for_each_point_mut(&mut self, mut f: impl FnMut(&mut CalibrationPoint)) {
        match self {
            Instrument::SingleChannel { points } | Instrument::MultiChannel { points, .. } => {
                points.iter_mut().for_each(&mut f)
            }
            Instrument::Repeater { syringes } => syringes
                .iter_mut()
                .flat_map(|s| s.points.iter_mut())
                .for_each(&mut f),
        }
    }
}

fn channel_points(unit: VolumeUnit, channel: u32) -> impl Iterator<Item = CalibrationPoint> {
    (1..=POINTS_PER_CHANNEL).map(move |position| CalibrationPoint::at_placement(unit, channel, position))
}

/// Index of (channel, position) in a contiguous channel-major point list
///
/// `None` for out-of-range addresses, including ones too large to index.
fn channel_index(channel: u32, position: u32) -> Option<usize> {
    if position == 0 || position > POINTS_PER_CHANNEL {
        return None;
    }
    let offset = channel.checked_sub(1)?.checked_mul(POINTS_PER_CHANNEL)?;
    let index = offset.checked_add(position - 1)?;
    usize::try_from(index).ok()
}

/// Form state for filling one certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSession {
    ambient: AmbientCondition,
    unit: VolumeUnit,
    instrument: Instrument,
}

impl CalibrationSession {
    /// Start a session with a single-channel pipette
    pub fn new(ambient: AmbientCondition, unit: VolumeUnit) -> Self {
        Self {
            ambient,
            unit,
            instrument: Instrument::canonical(InstrumentKind::SingleChannel, unit),
        }
    }

    pub fn ambient(&self) -> &AmbientCondition {
        &self.ambient
    }

    pub fn unit(&self) -> VolumeUnit {
        self.unit
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn z_factor(&self) -> f64 {
        self.ambient.z_factor()
    }

    pub fn point(&self, target: PointRef) -> Option<&CalibrationPoint> {
        self.instrument.point(target)
    }

    /// Switch instrument type, rebuilding the canonical layout
    ///
    /// Returns `false` (and keeps every point) when `kind` is already selected.
    pub fn select_instrument(&mut self, kind: InstrumentKind) -> bool {
        let current = self.instrument.kind();
        if current == kind {
            debug!("Instrument {} already selected", kind);
            return false;
        }

        info!("Switching instrument from {} to {}", current, kind);
        self.instrument = Instrument::canonical(kind, self.unit);
        true
    }

    /// Update ambient conditions and recompute every point
    pub fn set_ambient(&mut self, ambient: AmbientCondition) {
        self.ambient = ambient;
        let z = self.ambient.z_factor();
        debug!(
            temperature = ambient.temperature_celsius,
            z_factor = z,
            "Ambient changed, recomputing all points"
        );
        self.instrument.for_each_point_mut(|p| p.recompute(z));
    }

    /// Change the volume unit tag of every point
    pub fn set_unit(&mut self, unit: VolumeUnit) {
        self.unit = unit;
        self.instrument.for_each_point_mut(|p| p.set_unit(unit));
    }

    /// Add one point (single-channel) or one whole channel (multi-channel)
    pub fn add_point(&mut self) -> Result<PointRef> {
        let unit = self.unit;
        if let Instrument::SingleChannel { points } = &mut self.instrument {
            points.push(CalibrationPoint::new(unit));
            return Ok(PointRef::Single {
                index: points.len() - 1,
            });
        }

        match self.instrument.kind() {
            InstrumentKind::MultiChannel(_) => {
                let channel = self.add_channel()?;
                Ok(PointRef::Channel {
                    channel,
                    position: 1,
                })
            }
            _ => Err(Error::InvalidInput(
                "repeater points are added to a syringe".to_string(),
            )),
        }
    }

    /// Append a channel of three points, copying the master channel's nominal volumes
    ///
    /// Returns the new channel number.
    pub fn add_channel(&mut self) -> Result<u32> {
        let z = self.z_factor();
        let unit = self.unit;
        let kind = self.instrument.kind();
        let Instrument::MultiChannel { points, .. } = &mut self.instrument else {
            return Err(Error::InvalidInput(format!(
                "channels only exist on multi-channel pipettes, not on a {}",
                kind
            )));
        };

        let channel = points.len() as u32 / POINTS_PER_CHANNEL + 1;
        let master_nominals: Vec<String> = points
            .iter()
            .take(POINTS_PER_CHANNEL as usize)
            .map(|p| p.nominal_volume().to_string())
            .collect();

        for (mut point, nominal) in channel_points(unit, channel).zip(master_nominals) {
            point.set_nominal_volume(&nominal, z);
            points.push(point);
        }

        debug!("Added channel {}", channel);
        Ok(channel)
    }

    /// Remove a point (single-channel), a whole channel (multi-channel) or a syringe point
    ///
    /// Removing the last remaining point or channel is rejected and leaves the
    /// session unchanged.
    pub fn remove_point(&mut self, target: PointRef) -> Result<()> {
        match (self.instrument.kind(), target) {
            (InstrumentKind::SingleChannel, PointRef::Single { index }) => {
                self.remove_single_point(index)
            }
            (InstrumentKind::MultiChannel(_), PointRef::Channel { channel, .. }) => {
                self.remove_channel(channel)
            }
            (InstrumentKind::Repeater, PointRef::Syringe { syringe, point }) => {
                self.remove_syringe_point(syringe, point)
            }
            (kind, _) => Err(Error::InvalidInput(format!(
                "{} does not address a {}",
                target, kind
            ))),
        }
    }

    fn remove_single_point(&mut self, index: usize) -> Result<()> {
        let Instrument::SingleChannel { points } = &mut self.instrument else {
            return Err(Error::InvalidInput(
                "points are only removed by index on single-channel pipettes".to_string(),
            ));
        };

        if index >= points.len() {
            return Err(Error::NotFound(format!("point {}", index + 1)));
        }
        if points.len() <= 1 {
            warn!("Refusing to remove the last point");
            return Err(Error::Rejected(
                "at least one point must remain".to_string(),
            ));
        }

        points.remove(index);
        Ok(())
    }

    /// Remove a whole channel; later channels are renumbered to stay contiguous
    pub fn remove_channel(&mut self, channel: u32) -> Result<()> {
        let kind = self.instrument.kind();
        let Instrument::MultiChannel { points, .. } = &mut self.instrument else {
            return Err(Error::InvalidInput(format!(
                "channels only exist on multi-channel pipettes, not on a {}",
                kind
            )));
        };

        let total = points.len() as u32 / POINTS_PER_CHANNEL;
        if channel == 0 || channel > total {
            return Err(Error::NotFound(format!("channel {}", channel)));
        }
        if total <= 1 {
            warn!("Refusing to remove the last channel");
            return Err(Error::Rejected(
                "at least one channel must remain".to_string(),
            ));
        }

        let start = ((channel - 1) * POINTS_PER_CHANNEL) as usize;
        points.drain(start..start + POINTS_PER_CHANNEL as usize);

        // Placements follow list order
        for (i, point) in points.iter_mut().enumerate() {
            point.set_placement(ChannelPlacement {
                channel: i as u32 / POINTS_PER_CHANNEL + 1,
                position: i as u32 % POINTS_PER_CHANNEL + 1,
            });
        }

        debug!("Removed channel {}, {} remain", channel, total - 1);
        Ok(())
    }

    /// Add a repeater syringe with one point at the syringe's nominal volume
    ///
    /// Returns the new syringe index.
    pub fn add_syringe(&mut self, nominal_volume: &str) -> Result<usize> {
        let z = self.z_factor();
        let unit = self.unit;
        let kind = self.instrument.kind();
        let Instrument::Repeater { syringes } = &mut self.instrument else {
            return Err(Error::InvalidInput(format!(
                "syringes only exist on repeaters, not on a {}",
                kind
            )));
        };

        let mut first = CalibrationPoint::new(unit);
        first.set_nominal_volume(nominal_volume, z);
        syringes.push(Syringe {
            nominal_volume: first.nominal_volume().to_string(),
            points: vec![first],
        });

        Ok(syringes.len() - 1)
    }

    /// Remove a repeater syringe and all its points
    pub fn remove_syringe(&mut self, syringe: usize) -> Result<()> {
        let syringes = self.syringes_mut()?;
        if syringe >= syringes.len() {
            return Err(Error::NotFound(format!("syringe {}", syringe + 1)));
        }
        syringes.remove(syringe);
        Ok(())
    }

    /// Add an empty point to a repeater syringe
    pub fn add_syringe_point(&mut self, syringe: usize) -> Result<PointRef> {
        let unit = self.unit;
        let s = self
            .syringes_mut()?
            .get_mut(syringe)
            .ok_or_else(|| Error::NotFound(format!("syringe {}", syringe + 1)))?;

        s.points.push(CalibrationPoint::new(unit));
        Ok(PointRef::Syringe {
            syringe,
            point: s.points.len() - 1,
        })
    }

    /// Remove a point from a repeater syringe; its last point cannot be removed
    pub fn remove_syringe_point(&mut self, syringe: usize, point: usize) -> Result<()> {
        let s = self
            .syringes_mut()?
            .get_mut(syringe)
            .ok_or_else(|| Error::NotFound(format!("syringe {}", syringe + 1)))?;

        if point >= s.points.len() {
            return Err(Error::NotFound(format!(
                "syringe {} point {}",
                syringe + 1,
                point + 1
            )));
        }
        if s.points.len() <= 1 {
            warn!("Refusing to remove the last point of syringe {}", syringe + 1);
            return Err(Error::Rejected(
                "each syringe keeps at least one point".to_string(),
            ));
        }

        s.points.remove(point);
        Ok(())
    }

    /// Set the capacity label of a repeater syringe
    pub fn set_syringe_nominal_volume(&mut self, syringe: usize, text: &str) -> Result<()> {
        let s = self
            .syringes_mut()?
            .get_mut(syringe)
            .ok_or_else(|| Error::NotFound(format!("syringe {}", syringe + 1)))?;
        s.nominal_volume = crate::input::normalize_decimal_text(text);
        Ok(())
    }

    /// Set a point's nominal volume and recompute it
    ///
    /// On a multi-channel pipette an edit to the master channel is applied to
    /// the same position of every other channel. Measurements never propagate.
    pub fn set_nominal_volume(&mut self, target: PointRef, text: &str) -> Result<()> {
        let z = self.z_factor();
        let point = self.instrument.point_mut(target)?;
        point.set_nominal_volume(text, z);
        let normalized = point.nominal_volume().to_string();

        if let (
            PointRef::Channel {
                channel: MASTER_CHANNEL,
                position,
            },
            Instrument::MultiChannel { points, .. },
        ) = (target, &mut self.instrument)
        {
            let mut propagated = 0;
            for sibling in points.iter_mut().filter(|p| {
                p.placement()
                    .map(|pl| pl.position == position && pl.channel != MASTER_CHANNEL)
                    .unwrap_or(false)
            }) {
                sibling.set_nominal_volume(&normalized, z);
                propagated += 1;
            }
            debug!(
                "Master channel position {} nominal {} propagated to {} channels",
                position, normalized, propagated
            );
        }

        Ok(())
    }

    /// Replace a point's readings from a comma-separated paste and recompute it
    pub fn set_measurements(&mut self, target: PointRef, text: &str) -> Result<()> {
        let z = self.z_factor();
        self.instrument.point_mut(target)?.set_measurements(text, z);
        Ok(())
    }

    /// Replace a point's readings slot by slot and recompute it
    pub fn set_measurement_slots<I, S>(&mut self, target: PointRef, slots: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let z = self.z_factor();
        self.instrument
            .point_mut(target)?
            .set_measurement_slots(slots, z);
        Ok(())
    }

    fn syringes_mut(&mut self) -> Result<&mut Vec<Syringe>> {
        let kind = self.instrument.kind();
        match &mut self.instrument {
            Instrument::Repeater { syringes } => Ok(syringes),
            _ => Err(Error::InvalidInput(format!(
                "syringes only exist on repeaters, not on a {}",
                kind
            ))),
        }
    }
}
