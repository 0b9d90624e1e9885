//! Pulse record buffer: the bounded (pulse width, gap width) sequence a
//! detected package is delivered in.

use serde::{Deserialize, Serialize};

/// Capacity of a pulse record. A burst that fills the buffer ends the
/// package; the remainder starts a new one.
pub const PD_MAX_PULSES: usize = 1000;

/// Minimum subpulse count for a burst to qualify as FSK.
pub const PD_MIN_PULSES: usize = 16;

/// Threshold crossings shorter than this are spurious (noise).
pub const PD_MIN_PULSE_SAMPLES: u32 = 10;

/// Minimum gap (ms) before the gap/pulse ratio may end a package.
pub const PD_MIN_GAP_MS: u32 = 10;

/// A gap longer than this (ms) always ends the package.
pub const PD_MAX_GAP_MS: u32 = 100;

/// A gap this many times the longest pulse ends the package.
pub const PD_MAX_GAP_RATIO: u32 = 10;

/// Which demodulation produced a returned package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Ook,
    Fsk,
}

impl std::fmt::Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageKind::Ook => write!(f, "OOK"),
            PackageKind::Fsk => write!(f, "FSK"),
        }
    }
}

/// Ordered, fixed-capacity sequence of pulse/gap widths with side channels.
///
/// Owned by the caller and mutated in place by the detector; once a package
/// is returned the record is read-only until the next package begins.
/// `pulse[k]`/`gap[k]` entries at index ≥ `num_pulses` are stale.
pub struct PulseData {
    /// Sample rate the widths are measured at
    pub sample_rate: u32,
    /// Absolute index of the first burst sample in the global stream
    pub offset: u64,
    /// Distance from the burst start to the end of the latest buffer
    pub start_ago: u32,
    /// Distance from the burst end to the end of the latest buffer
    pub end_ago: u32,
    /// Number of complete (pulse, gap) entries
    pub num_pulses: usize,
    /// Pulse widths in samples
    pub pulse: [u32; PD_MAX_PULSES],
    /// Gap widths in samples
    pub gap: [u32; PD_MAX_PULSES],
    /// FSK F1 frequency estimate (FM sample units)
    pub fsk_f1_est: i32,
    /// FSK F2 frequency estimate (FM sample units)
    pub fsk_f2_est: i32,
    /// OOK noise floor estimate at package end
    pub ook_low_estimate: i32,
    /// OOK high level estimate at package end
    pub ook_high_estimate: i32,
}

impl PulseData {
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            offset: 0,
            start_ago: 0,
            end_ago: 0,
            num_pulses: 0,
            pulse: [0; PD_MAX_PULSES],
            gap: [0; PD_MAX_PULSES],
            fsk_f1_est: 0,
            fsk_f2_est: 0,
            ook_low_estimate: 0,
            ook_high_estimate: 0,
        }
    }

    /// Reset counters, estimates, and offsets for a new package. The width
    /// arrays are left as-is; entries become valid again as they are stored.
    pub fn clear(&mut self) {
        self.sample_rate = 0;
        self.offset = 0;
        self.start_ago = 0;
        self.end_ago = 0;
        self.num_pulses = 0;
        self.fsk_f1_est = 0;
        self.fsk_f2_est = 0;
        self.ook_low_estimate = 0;
        self.ook_high_estimate = 0;
    }

    /// Valid pulse widths.
    pub fn pulses(&self) -> &[u32] {
        &self.pulse[..self.num_pulses]
    }

    /// Valid gap widths.
    pub fn gaps(&self) -> &[u32] {
        &self.gap[..self.num_pulses]
    }
}

impl Default for PulseData {
    fn default() -> Self {
        Self::new()
    }
}
