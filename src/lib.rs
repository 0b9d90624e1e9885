//! pulsecap — OOK/FSK pulse detection for SDR baseband streams.
//!
//! Takes a pair of aligned i16 streams from an SDR front end — an AM
//! envelope and an FM discriminator output — demodulates the envelope as
//! On/Off Keying, detects Frequency Shift Keying subpulses inside long
//! bursts, and packages the result as pulse/gap records for a downstream
//! protocol decoder.
//!
//! The core lives in [`detect::PulseDetector`]; see [`pulse_data::PulseData`]
//! for the record format and [`sink::DebugSinks`] for the optional WAV
//! debug dumps.

pub mod detect;
pub mod dsp;
pub mod error;
pub mod package;
pub mod pulse_data;
pub mod sink;

pub use detect::{FskMode, PulseDetector};
pub use error::DetectorError;
pub use pulse_data::{PackageKind, PulseData};
