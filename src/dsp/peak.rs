//! Dual peak follower: adaptive high/low envelope tracker.

use crate::dsp::level::FULL_SCALE;
use crate::error::DetectorError;

/// Tracks the high and low envelope of a sample stream with one-pole
/// attack/release dynamics.
///
/// A sample above the high peak pulls it up at the attack rate; otherwise the
/// peak decays multiplicatively at the release rate, leaking toward zero over
/// roughly `1/(1-release)` samples. The low peak mirrors this for samples
/// below it.
///
/// The reported high is gated: while `|high_peak|` sits under the configured
/// noise floor the follower reports `high = 0`, which downstream reads as "no
/// valid envelope". The gate is one-sided on purpose — `low` is always
/// reported directly, even when the high side is squelched.
pub struct PeakFollower {
    /// Attack coefficient in (0,1); closer to 0 = faster attack
    attack_rate: f32,
    /// Release coefficient in (0,1); closer to 1 = slower decay
    release_rate: f32,
    /// High envelope state
    current_high_peak: f32,
    /// Low envelope state
    current_low_peak: f32,
    /// Linear squelch floor derived from the configured dB floor
    min_val: f32,
}

impl PeakFollower {
    /// Create a follower. `attack` and `release` must be in (0,1); a positive
    /// `min_db` floor is silently clamped to 0 dB.
    pub fn new(attack: f32, release: f32, min_db: f32) -> Result<Self, DetectorError> {
        if !(attack > 0.0 && attack < 1.0) {
            return Err(DetectorError::InvalidFollowerRate {
                name: "attack",
                value: attack,
            });
        }
        if !(release > 0.0 && release < 1.0) {
            return Err(DetectorError::InvalidFollowerRate {
                name: "release",
                value: release,
            });
        }
        let min_db = min_db.min(0.0);
        Ok(Self {
            attack_rate: attack,
            release_rate: release,
            current_high_peak: 0.0,
            current_low_peak: 0.0,
            min_val: FULL_SCALE as f32 * 10.0_f32.powf(min_db / 20.0),
        })
    }

    /// Feed one sample, returning the `(high, low)` envelope pair.
    pub fn process(&mut self, sample: i16) -> (i16, i16) {
        let x = sample as f32;

        if x > self.current_high_peak {
            self.current_high_peak =
                self.attack_rate * self.current_high_peak + (1.0 - self.attack_rate) * x;
        } else {
            self.current_high_peak *= self.release_rate;
        }

        if x < self.current_low_peak {
            self.current_low_peak =
                self.attack_rate * self.current_low_peak + (1.0 - self.attack_rate) * x;
        } else {
            self.current_low_peak *= self.release_rate;
        }

        let high = if self.current_high_peak.abs() < self.min_val {
            0
        } else {
            self.current_high_peak.round() as i16
        };
        let low = self.current_low_peak.round() as i16;
        (high, low)
    }
}
