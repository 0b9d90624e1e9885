//! Serializable package records for storing detected signals.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::pulse_data::{PackageKind, PulseData};

/// One pulse/gap entry, widths in samples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PulseGap {
    pub pulse: u32,
    pub gap: u32,
}

/// A detected package, ready for JSON export or a downstream decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Which demodulation produced the package
    pub kind: PackageKind,
    /// When the package was detected
    pub timestamp: DateTime<Utc>,
    /// Sample rate the widths are measured at
    pub sample_rate: u32,
    /// Absolute index of the first burst sample in the global stream
    pub offset: u64,
    /// Pulse/gap widths
    pub pulses: Vec<PulseGap>,
    /// FSK tone estimates (FM sample units); zero for plain OOK
    pub fsk_f1_est: i32,
    pub fsk_f2_est: i32,
    /// OOK level estimates at package end
    pub ook_low_estimate: i32,
    pub ook_high_estimate: i32,
}

impl PackageRecord {
    /// Snapshot a returned pulse record.
    pub fn from_pulse_data(kind: PackageKind, data: &PulseData) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            sample_rate: data.sample_rate,
            offset: data.offset,
            pulses: data
                .pulses()
                .iter()
                .zip(data.gaps())
                .map(|(&pulse, &gap)| PulseGap { pulse, gap })
                .collect(),
            fsk_f1_est: data.fsk_f1_est,
            fsk_f2_est: data.fsk_f2_est,
            ook_low_estimate: data.ook_low_estimate,
            ook_high_estimate: data.ook_high_estimate,
        }
    }

    /// Burst duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        let samples: u64 = self
            .pulses
            .iter()
            .map(|pg| pg.pulse as u64 + pg.gap as u64)
            .sum();
        samples as f64 / self.sample_rate as f64 * 1000.0
    }
}

/// Save records as pretty-printed JSON.
pub fn save_packages(path: impl AsRef<Path>, packages: &[PackageRecord]) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(packages)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write packages to {:?}", path))?;
    tracing::info!("Saved {} packages to {:?}", packages.len(), path);
    Ok(())
}

/// Load records from a JSON file written by [`save_packages`].
pub fn load_packages(path: impl AsRef<Path>) -> Result<Vec<PackageRecord>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read packages from {:?}", path))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed package file {:?}", path))
}
