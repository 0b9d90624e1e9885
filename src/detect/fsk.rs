//! FSK sub-detector: finds f1/f2 tone edges in the FM stream while the OOK
//! machine is inside the first pulse of a burst.

use crate::pulse_data::{PulseData, PD_MAX_PULSES, PD_MIN_PULSE_SAMPLES};

/// Subpulse detection algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FskMode {
    /// Rolling f1/f2 estimates, nearest-estimate classification, trailing
    /// subpulse flushed on wrap-up.
    Classic,
    /// Running min/max with midpoint classification. No wrap-up.
    Minmax,
}

/// Tone currently assigned to the FM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FskPhase {
    /// Initial settling: estimate the first tone, classify nothing
    Settle,
    /// On the first tone (f1)
    F1,
    /// On the second tone (f2)
    F2,
}

/// Slowness of the per-tone frequency estimators.
const FSK_EST_RATIO: i32 = 32;

/// Minimum tone separation (FM sample units) before a second tone is
/// believed. Keyfob-class FSK deviations land in the thousands.
const FSK_MIN_DEVIATION: i32 = 600;

/// Stateful subpulse detector. One instance lives inside the OOK machine and
/// is re-initialised at every pulse start.
pub(crate) struct FskDetector {
    mode: FskMode,
    phase: FskPhase,
    /// Samples since the last subpulse edge (or since init)
    pulse_length: u32,
    /// First-tone frequency estimate
    pub fm_f1_est: i32,
    /// Second-tone frequency estimate
    pub fm_f2_est: i32,
    /// Whether f2 has been seeded by an observed tone change (classic)
    f2_seeded: bool,
    /// Running extremes of the FM stream (minmax)
    fm_max: i32,
    fm_min: i32,
}

impl FskDetector {
    /// Fresh detector, seeded with the FM sample at the OOK pulse start.
    pub fn new(mode: FskMode, fm_n: i16) -> Self {
        Self {
            mode,
            phase: FskPhase::Settle,
            pulse_length: 0,
            fm_f1_est: fm_n as i32,
            fm_f2_est: 0,
            f2_seeded: false,
            fm_max: fm_n as i32,
            fm_min: fm_n as i32,
        }
    }

    /// Feed one FM sample, recording completed subpulses into `fsk_pulses`.
    pub fn process(&mut self, fm_n: i16, fsk_pulses: &mut PulseData) {
        match self.mode {
            FskMode::Classic => self.process_classic(fm_n, fsk_pulses),
            FskMode::Minmax => self.process_minmax(fm_n, fsk_pulses),
        }
    }

    /// Tone level for the decoded-FM debug stream: +1 on f1, -1 on f2.
    pub fn level(&self) -> i32 {
        match self.phase {
            FskPhase::Settle => 0,
            FskPhase::F1 => 1,
            FskPhase::F2 => -1,
        }
    }

    fn process_classic(&mut self, fm_n: i16, fsk_pulses: &mut PulseData) {
        let fm = fm_n as i32;
        self.pulse_length += 1;

        match self.phase {
            FskPhase::Settle => {
                // Fast estimator while the discriminator output settles
                self.fm_f1_est += (fm - self.fm_f1_est) / 2;
                if self.pulse_length >= PD_MIN_PULSE_SAMPLES {
                    self.phase = FskPhase::F1;
                }
            }
            FskPhase::F1 => {
                let f1_delta = (fm - self.fm_f1_est).abs();
                let f2_delta = (fm - self.fm_f2_est).abs();
                let flip = if self.f2_seeded {
                    f2_delta < f1_delta
                } else {
                    f1_delta > FSK_MIN_DEVIATION
                };
                if flip {
                    if !self.f2_seeded {
                        self.fm_f2_est = fm;
                        self.f2_seeded = true;
                    }
                    self.store_pulse(fsk_pulses);
                    self.phase = FskPhase::F2;
                } else if !self.f2_seeded || f1_delta < f2_delta {
                    // Track only samples clearly on this tone; equidistant
                    // samples (e.g. the discriminator going quiet) would
                    // drag the estimate off frequency
                    self.fm_f1_est += (fm - self.fm_f1_est) / FSK_EST_RATIO;
                }
            }
            FskPhase::F2 => {
                let f1_delta = (fm - self.fm_f1_est).abs();
                let f2_delta = (fm - self.fm_f2_est).abs();
                if f1_delta < f2_delta {
                    self.store_gap(fsk_pulses);
                    self.phase = FskPhase::F1;
                } else if f2_delta < f1_delta {
                    self.fm_f2_est += (fm - self.fm_f2_est) / FSK_EST_RATIO;
                }
            }
        }
    }

    fn process_minmax(&mut self, fm_n: i16, fsk_pulses: &mut PulseData) {
        let fm = fm_n as i32;
        self.pulse_length += 1;
        self.fm_max = self.fm_max.max(fm);
        self.fm_min = self.fm_min.min(fm);

        let spread = self.fm_max - self.fm_min;
        if spread < FSK_MIN_DEVIATION {
            // No second tone visible yet
            return;
        }
        let mid = self.fm_min + spread / 2;
        let hysteresis = spread / 8;

        match self.phase {
            FskPhase::Settle => {
                // First classification: seed the estimates from the observed
                // extremes so they start near the tones.
                self.fm_f1_est = self.fm_max;
                self.fm_f2_est = self.fm_min;
                if fm >= mid {
                    // The stream opened on the lower tone; a leading f2
                    // segment has no pulse to pair with, so drop it.
                    self.pulse_length = 0;
                    self.phase = FskPhase::F1;
                } else {
                    // The opening f1 segment just ended
                    self.store_pulse(fsk_pulses);
                    self.phase = FskPhase::F2;
                }
            }
            FskPhase::F1 => {
                if fm < mid - hysteresis {
                    self.store_pulse(fsk_pulses);
                    self.phase = FskPhase::F2;
                } else if fm > mid + hysteresis {
                    // Dead-zone samples carry no tone information
                    self.fm_f1_est += (fm - self.fm_f1_est) / FSK_EST_RATIO;
                }
            }
            FskPhase::F2 => {
                if fm > mid + hysteresis {
                    self.store_gap(fsk_pulses);
                    self.phase = FskPhase::F1;
                } else if fm < mid - hysteresis {
                    self.fm_f2_est += (fm - self.fm_f2_est) / FSK_EST_RATIO;
                }
            }
        }
    }

    /// Flush the trailing subpulse when the OOK gap is confirmed. Classic
    /// only; minmax drops the trailing segment.
    pub fn wrap_up(&mut self, fsk_pulses: &mut PulseData) {
        if self.mode != FskMode::Classic {
            return;
        }
        if fsk_pulses.num_pulses < PD_MAX_PULSES {
            self.pulse_length += 1;
            match self.phase {
                FskPhase::F1 => {
                    fsk_pulses.pulse[fsk_pulses.num_pulses] = self.pulse_length;
                    fsk_pulses.gap[fsk_pulses.num_pulses] = 0;
                    fsk_pulses.num_pulses += 1;
                }
                FskPhase::F2 => {
                    fsk_pulses.gap[fsk_pulses.num_pulses] = self.pulse_length;
                    fsk_pulses.num_pulses += 1;
                }
                FskPhase::Settle => {}
            }
        }
    }

    /// Close an f1 segment: pulse width of the current (not yet counted) entry.
    fn store_pulse(&mut self, fsk_pulses: &mut PulseData) {
        if fsk_pulses.num_pulses < PD_MAX_PULSES {
            fsk_pulses.pulse[fsk_pulses.num_pulses] = self.pulse_length;
        }
        self.pulse_length = 0;
    }

    /// Close an f2 segment: gap width, completing the entry.
    fn store_gap(&mut self, fsk_pulses: &mut PulseData) {
        if fsk_pulses.num_pulses < PD_MAX_PULSES {
            fsk_pulses.gap[fsk_pulses.num_pulses] = self.pulse_length;
            fsk_pulses.num_pulses += 1;
        }
        self.pulse_length = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternating(first: i16, second: i16, seg: usize, segments: usize) -> Vec<i16> {
        let mut v = Vec::new();
        for s in 0..segments {
            let tone = if s % 2 == 0 { first } else { second };
            v.extend(std::iter::repeat(tone).take(seg));
        }
        v
    }

    #[test]
    fn classic_splits_alternating_tones() {
        let mut det = FskDetector::new(FskMode::Classic, 5000);
        let mut rec = PulseData::new();
        for s in alternating(5000, -5000, 50, 20) {
            det.process(s, &mut rec);
        }
        // 20 segments → 10 f1 pulses, the trailing f2 is still open
        assert_eq!(rec.num_pulses, 9);
        for (&p, &g) in rec.pulses().iter().zip(rec.gaps()) {
            assert!((45..=55).contains(&p), "pulse {}", p);
            assert!((45..=55).contains(&g), "gap {}", g);
        }
        assert!((det.fm_f1_est - 5000).abs() < 200, "f1 {}", det.fm_f1_est);
        assert!((det.fm_f2_est + 5000).abs() < 200, "f2 {}", det.fm_f2_est);
    }

    #[test]
    fn classic_wrap_up_flushes_trailing_segment() {
        let mut det = FskDetector::new(FskMode::Classic, 5000);
        let mut rec = PulseData::new();
        for s in alternating(5000, -5000, 50, 4) {
            det.process(s, &mut rec);
        }
        let before = rec.num_pulses;
        det.wrap_up(&mut rec);
        assert_eq!(rec.num_pulses, before + 1);
    }

    #[test]
    fn classic_ignores_a_single_tone() {
        let mut det = FskDetector::new(FskMode::Classic, 4000);
        let mut rec = PulseData::new();
        for _ in 0..500 {
            det.process(4000, &mut rec);
        }
        assert_eq!(rec.num_pulses, 0);
    }

    #[test]
    fn minmax_splits_alternating_tones() {
        let mut det = FskDetector::new(FskMode::Minmax, 5000);
        let mut rec = PulseData::new();
        for s in alternating(5000, -5000, 50, 20) {
            det.process(s, &mut rec);
        }
        assert!(rec.num_pulses >= 9, "num_pulses {}", rec.num_pulses);
        for (&p, &g) in rec.pulses().iter().zip(rec.gaps()) {
            assert!((45..=55).contains(&p), "pulse {}", p);
            assert!((45..=55).contains(&g), "gap {}", g);
        }
    }

    #[test]
    fn minmax_stays_quiet_below_deviation() {
        let mut det = FskDetector::new(FskMode::Minmax, 100);
        let mut rec = PulseData::new();
        for s in alternating(100, -100, 50, 20) {
            det.process(s, &mut rec);
        }
        assert_eq!(rec.num_pulses, 0);
    }
}
