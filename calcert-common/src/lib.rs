//! # calcert Common Library
//!
//! Calibration statistics engine for micropipette and repeater certificates:
//! - Z-factor lookup (temperature-dependent mass to volume correction)
//! - Per-point accuracy and precision statistics
//! - Instrument point/channel reorganization (single, multi-channel, repeater)
//! - Certificate row assembly and session files
//! - Configuration loading

pub mod certificate;
pub mod config;
pub mod error;
pub mod input;
pub mod reorganizer;
pub mod session_file;
pub mod statistics;
pub mod zfactor;

pub use error::{Error, Result};
pub use reorganizer::{CalibrationSession, Instrument, InstrumentKind, PointRef};
pub use statistics::{compute_statistics, AmbientCondition, CalibrationPoint, DerivedStats};
pub use zfactor::resolve_z_factor;
