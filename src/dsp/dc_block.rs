//! Rolling-mean DC blocker for 16-bit streams.

use crate::error::DetectorError;

/// Subtracts the rolling mean of the last `len` samples. Used on the FM
/// discriminator stream, where a frequency offset shows up as a DC bias.
pub struct DcBlocker {
    /// Ring of the last `len` samples
    buffer: Vec<i16>,
    /// Running sum of the ring contents (invariant: `sum == Σ buffer`)
    sum: i32,
    /// Next write position
    index: usize,
}

impl DcBlocker {
    pub fn new(len: usize) -> Result<Self, DetectorError> {
        if len == 0 {
            return Err(DetectorError::InvalidDcBlockerLen);
        }
        Ok(Self {
            buffer: vec![0; len],
            sum: 0,
            index: 0,
        })
    }

    /// Insert a sample and return it with the rolling mean removed.
    pub fn filter(&mut self, sample: i16) -> i16 {
        self.sum += sample as i32 - self.buffer[self.index] as i32;
        self.buffer[self.index] = sample;
        self.index = (self.index + 1) % self.buffer.len();

        let n = self.buffer.len() as i32;
        // Round the mean to nearest, away from zero on ties
        let mean = if self.sum >= 0 {
            (self.sum + n / 2) / n
        } else {
            (self.sum - n / 2) / n
        };
        (sample as i32 - mean).clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_length() {
        assert!(DcBlocker::new(0).is_err());
    }

    #[test]
    fn dc_input_converges_to_zero_within_ring_length() {
        // Property 5: constant input of level k reads 0 once the ring fills.
        for k in [500i16, -1200, 30000] {
            let mut dc = DcBlocker::new(64).unwrap();
            let mut out = i16::MAX;
            for _ in 0..64 {
                out = dc.filter(k);
            }
            assert_eq!(out, 0, "level {}", k);
        }
    }

    #[test]
    fn removes_offset_from_a_square_wave() {
        let mut dc = DcBlocker::new(64).unwrap();
        // ±2000 square at a +700 offset, period well inside the ring
        let mut last_high = 0;
        let mut last_low = 0;
        for cycle in 0..40 {
            for _ in 0..8 {
                last_high = dc.filter(2700);
            }
            for _ in 0..8 {
                last_low = dc.filter(-1300);
            }
            if cycle > 10 {
                assert!((last_high - 2000).abs() < 100, "high {}", last_high);
                assert!((last_low + 2000).abs() < 100, "low {}", last_low);
            }
        }
    }
}
