//! OOK pulse detector with an embedded FSK sub-detector.
//!
//! Consumes a pair of aligned i16 streams (AM envelope + FM discriminator)
//! sample by sample and packages threshold crossings into pulse/gap records.
//! The envelope is conditioned by a median smoother and an adaptive dual
//! peak follower; thresholds derive from the follower's high/low envelope
//! (or, in classical mode, from slow low/high level estimators). Inside the
//! first pulse of a burst the FM stream runs through the FSK sub-detector;
//! a burst with enough subpulses is returned as an FSK package instead.
//!
//! Key design: a package is returned mid-buffer with the read position
//! preserved, so the caller re-invokes with the same buffer until the
//! detector reports it needs more data. Feeding one large buffer or the
//! same samples in arbitrary sub-buffers yields identical packages.

pub mod fsk;

use crate::dsp::level::{
    amp_to_att, db_to_amp, db_to_amp_f, db_to_mag, db_to_mag_f, mag_to_att,
};
use crate::dsp::{DcBlocker, MedianFilter, PeakFollower};
use crate::error::DetectorError;
use crate::pulse_data::{
    PackageKind, PulseData, PD_MAX_GAP_MS, PD_MAX_GAP_RATIO, PD_MAX_PULSES, PD_MIN_GAP_MS,
    PD_MIN_PULSES, PD_MIN_PULSE_SAMPLES,
};
use crate::sink::DebugSinks;
use fsk::FskDetector;
pub use fsk::FskMode;

// ─── Detector tunables ───────────────────────────────────────────────────────

/// Ceiling for the OOK high level estimate (0 dB).
const OOK_MAX_HIGH_LEVEL_DB: f32 = 0.0;
/// Ceiling for the OOK low (noise) level estimate.
const OOK_MAX_LOW_LEVEL_DB: f32 = -15.0;
/// Slowness of the high level estimator.
const OOK_EST_HIGH_RATIO: i32 = 64;
/// Slowness of the low (noise) level estimator; also the lead-in length.
const OOK_EST_LOW_RATIO: i32 = 1024;
/// Peak follower squelch floor.
const MIN_DB: f32 = -20.0;
/// Default minimum high level (dB) until `set_levels` says otherwise.
const DEFAULT_MIN_HIGH_DB: f32 = -12.0;
/// Default high/low ratio (dB) until `set_levels` says otherwise.
const DEFAULT_HIGH_LOW_RATIO_DB: f32 = 9.0;

/// AM median smoother window.
const MEDIAN_WINDOW: usize = 15;
/// FM DC blocker ring length; longer than any FSK symbol we care about.
const DC_BLOCK_LEN: usize = 256;
/// Peak follower attack: fast enough to catch a pulse within a few samples.
const PEAK_ATTACK: f32 = 0.9;
/// Peak follower release: leaks over ~2000 samples so short gaps hold level.
const PEAK_RELEASE: f32 = 0.9995;

/// Amplitude of the decoded square waves in the debug dumps.
const SQUARE_LEVEL: i16 = 8000;

fn clamp_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

// ─── State machine ───────────────────────────────────────────────────────────

/// OOK demodulation phase with its per-state counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OokPhase {
    /// No signal; estimating the noise floor
    Idle,
    /// Inside a pulse, `len` samples so far
    Pulse { len: u32 },
    /// Inside a gap too short to be believed yet
    GapStart { len: u32 },
    /// Inside a confirmed gap. `eop_on_spurious` is set when a spurious
    /// pulse ended the burst and forces end-of-package.
    Gap { len: u32, eop_on_spurious: bool },
}

/// Streaming OOK/FSK pulse detector for one signal channel.
///
/// Create once per channel; the instance owns its conditioning filters and
/// debug sinks and borrows the caller's pulse records during `detect`. Not
/// reentrant — one caller at a time.
pub struct PulseDetector {
    // ── Configuration ──
    /// Interpret dB levels with the magnitude (÷20) mapping
    use_mag_est: bool,
    /// Manual threshold override (classical mode); 0 = disabled
    ook_fixed_high_level: i32,
    /// Floor for the high level estimate
    ook_min_high_level: i32,
    /// Default high estimate as a linear ratio of the low estimate
    ook_high_low_ratio: f32,
    /// Peak-follower thresholding (default) vs classical estimators
    use_peak_follower: bool,
    verbosity: u8,
    ook_max_high_level: i32,
    ook_max_low_level: i32,

    // ── Signal conditioning ──
    am_median: MedianFilter,
    am_peak: PeakFollower,
    fm_dc: DcBlocker,
    fm_peak: PeakFollower,

    // ── Machine state ──
    phase: OokPhase,
    /// Read position in the current buffer; preserved across a package return
    data_counter: usize,
    /// Saturating counter gating pulse acceptance until the noise estimate settles
    lead_in_counter: i32,
    ook_low_estimate: i32,
    ook_high_estimate: i32,
    /// Widest pulse of the current burst, for the gap/pulse ratio check
    max_pulse: u32,
    fsk: FskDetector,

    // ── Debug output ──
    sinks: DebugSinks,
    out_am: i16,
    out_fm: i16,
}

impl PulseDetector {
    /// Create a detector with default levels (amplitude mapping, min high
    /// -12 dB, high/low ratio 9 dB) and peak-follower thresholding.
    pub fn new() -> Result<Self, DetectorError> {
        let mut detector = Self {
            use_mag_est: false,
            ook_fixed_high_level: 0,
            ook_min_high_level: 0,
            ook_high_low_ratio: 0.0,
            use_peak_follower: true,
            verbosity: 0,
            ook_max_high_level: 0,
            ook_max_low_level: 0,
            am_median: MedianFilter::new(MEDIAN_WINDOW)?,
            am_peak: PeakFollower::new(PEAK_ATTACK, PEAK_RELEASE, MIN_DB)?,
            fm_dc: DcBlocker::new(DC_BLOCK_LEN)?,
            fm_peak: PeakFollower::new(PEAK_ATTACK, PEAK_RELEASE, MIN_DB)?,
            phase: OokPhase::Idle,
            data_counter: 0,
            lead_in_counter: 0,
            ook_low_estimate: 0,
            ook_high_estimate: 0,
            max_pulse: 0,
            fsk: FskDetector::new(FskMode::Classic, 0),
            sinks: DebugSinks::default(),
            out_am: 0,
            out_fm: 0,
        };
        detector.set_levels(false, 0.0, DEFAULT_MIN_HIGH_DB, DEFAULT_HIGH_LOW_RATIO_DB, 0);
        Ok(detector)
    }

    /// Configure detection levels, all in dB relative to full scale (16384).
    ///
    /// A negative `fixed_high_db` arms the manual threshold override for
    /// classical mode; zero or positive disarms it. `use_mag_est` selects the
    /// magnitude (÷20) dB mapping instead of amplitude (÷10).
    pub fn set_levels(
        &mut self,
        use_mag_est: bool,
        fixed_high_db: f32,
        min_high_db: f32,
        high_low_ratio_db: f32,
        verbosity: u8,
    ) {
        let to_level = if use_mag_est { db_to_mag } else { db_to_amp };
        let to_ratio = if use_mag_est { db_to_mag_f } else { db_to_amp_f };
        self.use_mag_est = use_mag_est;
        self.ook_fixed_high_level = if fixed_high_db < 0.0 {
            to_level(fixed_high_db)
        } else {
            0
        };
        self.ook_min_high_level = to_level(min_high_db);
        self.ook_high_low_ratio = to_ratio(high_low_ratio_db);
        self.ook_max_high_level = to_level(OOK_MAX_HIGH_LEVEL_DB);
        self.ook_max_low_level = to_level(OOK_MAX_LOW_LEVEL_DB);
        self.verbosity = verbosity;
    }

    /// Switch between classical estimator thresholds and the default
    /// peak-follower thresholds.
    pub fn set_classic_thresholds(&mut self, classic: bool) {
        self.use_peak_follower = !classic;
    }

    /// Attach (or detach, with a default bundle) the per-sample debug sinks.
    pub fn set_debug_sinks(&mut self, sinks: DebugSinks) {
        self.sinks = sinks;
    }

    /// Process new samples, returning the next package found or `None` when
    /// the buffer is exhausted.
    ///
    /// On a package return the read position is preserved: call again with
    /// the SAME buffer to continue (the caller must consume the records
    /// first — the next package will clear them). `sample_offset` is the
    /// global stream index of `envelope[0]` and only seeds `offset` in the
    /// records.
    pub fn detect(
        &mut self,
        envelope: &[i16],
        fm: &[i16],
        samp_rate: u32,
        sample_offset: u64,
        pulses: &mut PulseData,
        fsk_pulses: &mut PulseData,
        fpdm: FskMode,
    ) -> Option<PackageKind> {
        let len = envelope.len().min(fm.len());
        let samples_per_ms = samp_rate / 1000;

        if self.data_counter == 0 {
            // Fresh buffer: age the records relative to the new buffer end
            pulses.start_ago = pulses.start_ago.saturating_add(len as u32);
            fsk_pulses.start_ago = fsk_pulses.start_ago.saturating_add(len as u32);
        }
        self.ook_high_estimate = self.ook_high_estimate.max(self.ook_min_high_level);

        while self.data_counter < len {
            let am_s = self.am_median.process(envelope[self.data_counter]);
            let fm_n = fm[self.data_counter];

            // FM conditioning. The thresholds are debug-only; the DC blocker
            // keeps the dumped stream centred when the front end is off-tune.
            let fm_dcb = self.fm_dc.filter(fm_n);
            let (fm_hi, fm_lo) = self.fm_peak.process(fm_dcb);
            let fm_amp = (fm_hi as i32 - fm_lo as i32) / 2;
            let fm_center = fm_lo as i32 + fm_amp;
            let fm_thr_hi = fm_center + fm_amp / 4;
            let fm_thr_lo = fm_center - fm_amp / 4;

            // AM working sample and detection thresholds
            let (am_n, thr_hi, thr_lo) = if self.use_peak_follower {
                let (hi, lo) = self.am_peak.process(am_s);
                let amp = (hi as i32 - lo as i32) / 2;
                let center = lo as i32 + amp;
                // hi == 0 means the follower sees no valid envelope
                let am_n = if hi == 0 { 0 } else { am_s as i32 };
                (am_n, center + amp / 4, center - amp / 4)
            } else {
                let mut thr =
                    self.ook_low_estimate + (self.ook_high_estimate - self.ook_low_estimate) / 2;
                if self.ook_fixed_high_level != 0 {
                    thr = self.ook_fixed_high_level; // manual override
                }
                (am_s as i32, thr + thr / 8, thr - thr / 8)
            };

            match self.phase {
                OokPhase::Idle => {
                    if am_n > thr_hi && self.lead_in_counter > OOK_EST_LOW_RATIO {
                        // Pulse found: seed both records for a new package
                        pulses.clear();
                        fsk_pulses.clear();
                        pulses.sample_rate = samp_rate;
                        fsk_pulses.sample_rate = samp_rate;
                        pulses.offset = sample_offset + self.data_counter as u64;
                        fsk_pulses.offset = pulses.offset;
                        pulses.start_ago = (len - self.data_counter) as u32;
                        fsk_pulses.start_ago = pulses.start_ago;
                        self.max_pulse = 0;
                        self.fsk = FskDetector::new(fpdm, fm_n);
                        if self.verbosity > 1 {
                            tracing::trace!(offset = pulses.offset, thr_hi, "pulse start");
                        }
                        self.phase = OokPhase::Pulse { len: 0 };
                    } else {
                        // Noise floor estimation; the ±1 nudge compensates
                        // for integer truncation at this slow a ratio
                        let low_delta = am_n - self.ook_low_estimate;
                        self.ook_low_estimate += low_delta / OOK_EST_LOW_RATIO;
                        self.ook_low_estimate += if low_delta > 0 { 1 } else { -1 };
                        self.ook_low_estimate = self.ook_low_estimate.min(self.ook_max_low_level);
                        self.ook_high_estimate =
                            ((self.ook_high_low_ratio * self.ook_low_estimate as f32) as i32)
                                .max(self.ook_min_high_level)
                                .min(self.ook_max_high_level);
                        if self.lead_in_counter <= OOK_EST_LOW_RATIO {
                            self.lead_in_counter += 1;
                        }
                    }
                }

                OokPhase::Pulse { len: plen } => {
                    let plen = plen + 1;
                    if am_n < thr_lo {
                        if plen < PD_MIN_PULSE_SAMPLES {
                            // Spurious pulse
                            if pulses.num_pulses == 0 {
                                self.phase = OokPhase::Idle; // never a burst
                            } else {
                                self.phase = OokPhase::Gap {
                                    len: 0,
                                    eop_on_spurious: true,
                                };
                            }
                        } else {
                            pulses.pulse[pulses.num_pulses] = plen;
                            self.max_pulse = self.max_pulse.max(plen);
                            self.phase = OokPhase::GapStart { len: 0 };
                        }
                    } else {
                        self.phase = OokPhase::Pulse { len: plen };
                        // High level estimate leaks toward the signal
                        self.ook_high_estimate += am_n / OOK_EST_HIGH_RATIO
                            - self.ook_high_estimate / OOK_EST_HIGH_RATIO;
                        self.ook_high_estimate = self
                            .ook_high_estimate
                            .max(self.ook_min_high_level)
                            .min(self.ook_max_high_level);
                        // Pulse carrier frequency estimate
                        pulses.fsk_f1_est += fm_n as i32 / OOK_EST_HIGH_RATIO
                            - pulses.fsk_f1_est / OOK_EST_HIGH_RATIO;
                    }
                    // FSK runs only inside the first pulse of the burst
                    if pulses.num_pulses == 0 {
                        self.fsk.process(fm_n, fsk_pulses);
                    }
                }

                OokPhase::GapStart { len: glen } => {
                    let glen = glen + 1;
                    if am_n > thr_hi {
                        // Spurious gap: resume the pulse, width restored
                        self.phase = OokPhase::Pulse {
                            len: glen + pulses.pulse[pulses.num_pulses],
                        };
                    } else if glen >= PD_MIN_PULSE_SAMPLES {
                        if fsk_pulses.num_pulses > PD_MIN_PULSES {
                            // Enough subpulses: the burst was FSK. Close up.
                            self.fsk.wrap_up(fsk_pulses);
                            fsk_pulses.fsk_f1_est = self.fsk.fm_f1_est;
                            fsk_pulses.fsk_f2_est = self.fsk.fm_f2_est;
                            fsk_pulses.ook_low_estimate = self.ook_low_estimate;
                            fsk_pulses.ook_high_estimate = self.ook_high_estimate;
                            let end_ago = (len - self.data_counter) as u32;
                            pulses.end_ago = end_ago;
                            fsk_pulses.end_ago = end_ago;
                            self.phase = OokPhase::Idle;
                            self.log_package(PackageKind::Fsk, fsk_pulses);
                            return Some(PackageKind::Fsk);
                        }
                        self.phase = OokPhase::Gap {
                            len: glen,
                            eop_on_spurious: false,
                        };
                    } else {
                        self.phase = OokPhase::GapStart { len: glen };
                    }
                    // A spurious gap may still return to the first pulse
                    if pulses.num_pulses == 0 {
                        self.fsk.process(fm_n, fsk_pulses);
                    }
                }

                OokPhase::Gap {
                    len: glen,
                    eop_on_spurious,
                } => {
                    let glen = glen + 1;
                    if eop_on_spurious {
                        // The burst ended on a spurious pulse whose width was
                        // never stored; close on the last complete entry
                        self.finalize_ook(pulses, len);
                        return Some(PackageKind::Ook);
                    }
                    if am_n > thr_hi {
                        pulses.gap[pulses.num_pulses] = glen;
                        pulses.num_pulses += 1;
                        if pulses.num_pulses >= PD_MAX_PULSES {
                            // Record full. The pulse that tripped the
                            // overflow starts the next package on resume.
                            self.finalize_ook(pulses, len);
                            return Some(PackageKind::Ook);
                        }
                        self.phase = OokPhase::Pulse { len: 0 };
                    } else if (glen > PD_MAX_GAP_RATIO * self.max_pulse
                        && glen > PD_MIN_GAP_MS * samples_per_ms)
                        || glen > PD_MAX_GAP_MS * samples_per_ms
                    {
                        // Gap ends the package; store it as the trailing entry
                        pulses.gap[pulses.num_pulses] = glen;
                        pulses.num_pulses += 1;
                        self.finalize_ook(pulses, len);
                        return Some(PackageKind::Ook);
                    } else {
                        self.phase = OokPhase::Gap {
                            len: glen,
                            eop_on_spurious,
                        };
                    }
                }
            }

            // Debug streams, written once per consumed sample (a package
            // return leaves the sample to be reprocessed, and written, on
            // the resumed call)
            self.out_am = match self.phase {
                OokPhase::Pulse { .. } | OokPhase::GapStart { .. } => SQUARE_LEVEL,
                _ => 0,
            };
            self.out_fm = match self.phase {
                OokPhase::Pulse { .. } | OokPhase::GapStart { .. }
                    if pulses.num_pulses == 0 =>
                {
                    clamp_i16(self.fsk.level() * SQUARE_LEVEL as i32)
                }
                _ => 0,
            };
            if let Some(s) = self.sinks.am.as_mut() {
                s.write(am_s);
            }
            if let Some(s) = self.sinks.fm.as_mut() {
                s.write(fm_n);
            }
            if let Some(s) = self.sinks.fm_thr_hi.as_mut() {
                s.write(clamp_i16(fm_thr_hi));
            }
            if let Some(s) = self.sinks.fm_thr_lo.as_mut() {
                s.write(clamp_i16(fm_thr_lo));
            }
            if let Some(s) = self.sinks.out_am.as_mut() {
                s.write(self.out_am);
            }
            if let Some(s) = self.sinks.out_fm.as_mut() {
                s.write(self.out_fm);
            }

            self.data_counter += 1;
        }

        self.data_counter = 0; // buffer fully consumed
        None
    }

    /// Store the final estimates, stamp `end_ago`, and go idle.
    fn finalize_ook(&mut self, pulses: &mut PulseData, len: usize) {
        pulses.ook_low_estimate = self.ook_low_estimate;
        pulses.ook_high_estimate = self.ook_high_estimate;
        pulses.end_ago = (len - self.data_counter) as u32;
        self.phase = OokPhase::Idle;
        self.log_package(PackageKind::Ook, pulses);
    }

    fn log_package(&self, kind: PackageKind, record: &PulseData) {
        if self.verbosity == 0 {
            return;
        }
        let att = if self.use_mag_est { mag_to_att } else { amp_to_att };
        let low_att = att(clamp_i16(record.ook_low_estimate));
        let high_att = att(clamp_i16(record.ook_high_estimate));
        tracing::debug!(
            %kind,
            num_pulses = record.num_pulses,
            low_att,
            high_att,
            "package closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SampleSink;
    use std::cell::RefCell;
    use std::rc::Rc;

    const RATE: u32 = 250_000;
    const AMP: i16 = 20000;

    /// Lead-in long enough for the noise estimate to settle.
    const LEAD_IN: usize = 3000;

    fn ook_stream(pulses: &[(usize, usize)], tail: usize) -> Vec<i16> {
        let mut v = vec![0i16; LEAD_IN];
        for &(pulse, gap) in pulses {
            v.extend(std::iter::repeat(AMP).take(pulse));
            v.extend(std::iter::repeat(0i16).take(gap));
        }
        v.extend(std::iter::repeat(0i16).take(tail));
        v
    }

    /// Run a full stream (optionally pre-split into sub-buffers) through a
    /// fresh detector and collect every returned package.
    fn run(
        detector: &mut PulseDetector,
        buffers: &[(&[i16], &[i16])],
        mode: FskMode,
    ) -> Vec<(PackageKind, usize, Vec<u32>, Vec<u32>, u64, i32, i32)> {
        let mut pulses = PulseData::new();
        let mut fsk_pulses = PulseData::new();
        let mut packages = Vec::new();
        let mut offset = 0u64;
        for &(env, fmv) in buffers {
            loop {
                match detector.detect(env, fmv, RATE, offset, &mut pulses, &mut fsk_pulses, mode) {
                    Some(PackageKind::Ook) => packages.push((
                        PackageKind::Ook,
                        pulses.num_pulses,
                        pulses.pulses().to_vec(),
                        pulses.gaps().to_vec(),
                        pulses.offset,
                        pulses.ook_low_estimate,
                        pulses.ook_high_estimate,
                    )),
                    Some(PackageKind::Fsk) => packages.push((
                        PackageKind::Fsk,
                        fsk_pulses.num_pulses,
                        fsk_pulses.pulses().to_vec(),
                        fsk_pulses.gaps().to_vec(),
                        fsk_pulses.offset,
                        fsk_pulses.fsk_f1_est,
                        fsk_pulses.fsk_f2_est,
                    )),
                    None => break,
                }
            }
            offset += env.len() as u64;
        }
        packages
    }

    fn run_one(env: &[i16], fmv: &[i16]) -> Vec<(PackageKind, usize, Vec<u32>, Vec<u32>, u64, i32, i32)> {
        let mut detector = PulseDetector::new().unwrap();
        run(&mut detector, &[(env, fmv)], FskMode::Classic)
    }

    #[test]
    fn s1_single_short_ook_burst() {
        let env = ook_stream(&[(100, 200), (100, 200), (100, 200), (100, 200), (100, 0)], 6000);
        let fmv = vec![0i16; env.len()];
        let packages = run_one(&env, &fmv);

        assert_eq!(packages.len(), 1);
        let (kind, num, pulses, gaps, _, _, _) = &packages[0];
        assert_eq!(*kind, PackageKind::Ook);
        assert_eq!(*num, 5);
        for &p in pulses {
            assert!((98..=102).contains(&p), "pulse width {}", p);
        }
        for &g in &gaps[..4] {
            assert!((198..=202).contains(&g), "gap width {}", g);
        }
    }

    #[test]
    fn s2_spurious_glitch_before_lead_in() {
        // 3-sample spike while the noise estimate is still settling
        let mut env = vec![0i16; 500];
        env.extend_from_slice(&[AMP, AMP, AMP]);
        env.extend(std::iter::repeat(0i16).take(500));
        let fmv = vec![0i16; env.len()];

        let mut detector = PulseDetector::new().unwrap();
        let packages = run(&mut detector, &[(&env, &fmv)], FskMode::Classic);

        assert!(packages.is_empty());
        assert_eq!(detector.phase, OokPhase::Idle);
        assert!(
            detector.ook_low_estimate.abs() < 50,
            "noise estimate perturbed: {}",
            detector.ook_low_estimate
        );
    }

    #[test]
    fn s3_fsk_inside_long_pulse() {
        let mut env = vec![0i16; LEAD_IN];
        env.extend(std::iter::repeat(AMP).take(4000));
        env.extend(std::iter::repeat(0i16).take(5000));
        // FM alternates ±5000 every 50 samples while the AM pulse is up
        let mut fmv = vec![0i16; LEAD_IN];
        for seg in 0..80 {
            let tone = if seg % 2 == 0 { 5000 } else { -5000 };
            fmv.extend(std::iter::repeat(tone).take(50));
        }
        fmv.extend(std::iter::repeat(0i16).take(5000));

        for mode in [FskMode::Classic, FskMode::Minmax] {
            let mut detector = PulseDetector::new().unwrap();
            let packages = run(&mut detector, &[(&env, &fmv)], mode);
            assert_eq!(packages.len(), 1, "{:?}", mode);
            let (kind, num, _, _, _, f1, f2) = &packages[0];
            assert_eq!(*kind, PackageKind::Fsk, "{:?}", mode);
            assert!(*num >= PD_MIN_PULSES, "{:?}: num_pulses {}", mode, num);
            assert!((f1 - 5000).abs() < 300, "{:?}: f1 {}", mode, f1);
            assert!((f2 + 5000).abs() < 300, "{:?}: f2 {}", mode, f2);
        }
    }

    #[test]
    fn s4_overflow_splits_the_package() {
        let mut bursts = vec![(20usize, 20usize); 1199];
        bursts.push((20, 0));
        let env = ook_stream(&bursts, 6000);
        let fmv = vec![0i16; env.len()];
        let packages = run_one(&env, &fmv);

        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].1, PD_MAX_PULSES);
        assert_eq!(packages[1].1, 200);
        for &p in packages[0].2.iter().chain(packages[1].2.iter()) {
            assert!((18..=22).contains(&p), "pulse width {}", p);
        }
    }

    #[test]
    fn s5_eop_by_max_gap() {
        // One long pulse so the gap/pulse ratio path stays quiet and the
        // absolute maximum-gap limit is what ends the package
        let env = ook_stream(&[(10000, 0)], 26000);
        let fmv = vec![0i16; env.len()];
        let packages = run_one(&env, &fmv);

        assert_eq!(packages.len(), 1);
        let (kind, num, pulses, gaps, _, _, _) = &packages[0];
        assert_eq!(*kind, PackageKind::Ook);
        assert_eq!(*num, 1);
        assert!((9998..=10002).contains(&pulses[0]), "pulse {}", pulses[0]);
        let max_gap = PD_MAX_GAP_MS * (RATE / 1000) + 1;
        assert_eq!(gaps[0], max_gap);
    }

    #[test]
    fn s6_buffer_split_matches_single_buffer() {
        let env = ook_stream(&[(100, 200), (100, 200), (100, 200), (100, 200), (100, 0)], 6000);
        let fmv = vec![0i16; env.len()];
        let whole = run_one(&env, &fmv);

        // Arbitrary three-way partition of the same stream
        let cuts = [0usize, 1234, 4001, env.len()];
        let mut detector = PulseDetector::new().unwrap();
        let buffers: Vec<(&[i16], &[i16])> = cuts
            .windows(2)
            .map(|w| (&env[w[0]..w[1]], &fmv[w[0]..w[1]]))
            .collect();
        let split = run(&mut detector, &buffers, FskMode::Classic);

        assert_eq!(whole, split);
        // The offset lands on the first above-threshold sample
        let offset = whole[0].4;
        assert!(
            (LEAD_IN as u64..LEAD_IN as u64 + 12).contains(&offset),
            "offset {}",
            offset
        );
    }

    #[test]
    fn round_trip_reproduces_a_pulse_list() {
        // Property 7: known pulse list, ideal thresholds, zero noise
        let list = [(120usize, 300usize), (80, 150), (400, 220), (50, 180), (250, 0)];
        let env = ook_stream(&list, 8000);
        let fmv = vec![0i16; env.len()];
        let packages = run_one(&env, &fmv);

        assert_eq!(packages.len(), 1);
        let (_, num, pulses, gaps, _, _, _) = &packages[0];
        assert_eq!(*num, list.len());
        for (k, &(p, g)) in list.iter().enumerate() {
            assert!(
                (pulses[k] as i64 - p as i64).abs() <= 2,
                "pulse {}: {} vs {}",
                k,
                pulses[k],
                p
            );
            if g > 0 {
                assert!(
                    (gaps[k] as i64 - g as i64).abs() <= 2,
                    "gap {}: {} vs {}",
                    k,
                    gaps[k],
                    g
                );
            }
        }
    }

    #[test]
    fn spurious_pulse_ends_the_package_without_a_bogus_entry() {
        // Property 2: two real pulses, then a 9-sample spike. The spike
        // survives the median (wider than half the window) but is shorter
        // than the spurious limit at the state machine, so it must end the
        // package without landing in the record.
        let mut env = vec![0i16; LEAD_IN];
        env.extend(std::iter::repeat(AMP).take(100));
        env.extend(std::iter::repeat(0i16).take(200));
        env.extend(std::iter::repeat(AMP).take(100));
        env.extend(std::iter::repeat(0i16).take(200));
        env.extend(std::iter::repeat(AMP).take(9));
        env.extend(std::iter::repeat(0i16).take(8000));
        let fmv = vec![0i16; env.len()];
        let packages = run_one(&env, &fmv);

        assert_eq!(packages.len(), 1);
        let (kind, num, pulses, _, _, _, _) = &packages[0];
        assert_eq!(*kind, PackageKind::Ook);
        assert_eq!(*num, 2);
        for &p in pulses {
            assert!(p >= PD_MIN_PULSE_SAMPLES, "width {}", p); // Property 2
        }
        assert!(*num <= PD_MAX_PULSES); // Property 1
    }

    #[test]
    fn classical_thresholds_detect_the_same_burst() {
        let env = ook_stream(&[(100, 200), (100, 200), (100, 0)], 6000);
        let fmv = vec![0i16; env.len()];
        let mut detector = PulseDetector::new().unwrap();
        detector.set_classic_thresholds(true);
        let packages = run(&mut detector, &[(&env, &fmv)], FskMode::Classic);

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].1, 3);
        for &p in &packages[0].2 {
            assert!((98..=102).contains(&p), "pulse width {}", p);
        }
    }

    #[test]
    fn set_levels_arms_and_disarms_the_manual_override() {
        let mut detector = PulseDetector::new().unwrap();
        detector.set_levels(false, -6.0, -12.0, 9.0, 0);
        assert_eq!(detector.ook_fixed_high_level, db_to_amp(-6.0));
        detector.set_levels(false, 0.0, -12.0, 9.0, 0);
        assert_eq!(detector.ook_fixed_high_level, 0);
        detector.set_levels(true, -6.0, -12.0, 9.0, 0);
        assert_eq!(detector.ook_fixed_high_level, db_to_mag(-6.0));
        assert_eq!(detector.ook_min_high_level, db_to_mag(-12.0));
    }

    struct TestSink(Rc<RefCell<Vec<i16>>>);

    impl SampleSink for TestSink {
        fn write(&mut self, sample: i16) {
            self.0.borrow_mut().push(sample);
        }
    }

    #[test]
    fn debug_sinks_receive_every_sample_once() {
        let env = ook_stream(&[(100, 200), (100, 0)], 6000);
        let fmv = vec![0i16; env.len()];

        let am = Rc::new(RefCell::new(Vec::new()));
        let out_am = Rc::new(RefCell::new(Vec::new()));
        let mut detector = PulseDetector::new().unwrap();
        detector.set_debug_sinks(DebugSinks {
            am: Some(Box::new(TestSink(am.clone()))),
            out_am: Some(Box::new(TestSink(out_am.clone()))),
            ..Default::default()
        });
        run(&mut detector, &[(&env, &fmv)], FskMode::Classic);

        assert_eq!(am.borrow().len(), env.len());
        assert_eq!(out_am.borrow().len(), env.len());
        let highs = out_am.borrow().iter().filter(|&&s| s == SQUARE_LEVEL).count();
        assert!(
            (190..=230).contains(&highs),
            "square wave high for {} samples",
            highs
        );
    }
}
