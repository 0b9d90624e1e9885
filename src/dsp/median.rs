//! Running median smoother for the AM envelope stream.

use crate::error::DetectorError;

/// Odd-window running median. History starts zeroed, so the first `window/2`
/// outputs lean toward zero — the detector's lead-in absorbs that.
pub struct MedianFilter {
    /// Circular history of the last `window` inputs
    history: Vec<i16>,
    /// Scratch buffer reused for sorting (no allocation per sample)
    scratch: Vec<i16>,
    /// Next write position in the circular history
    index: usize,
}

impl MedianFilter {
    /// Create a median filter with the given window size (odd, nonzero).
    pub fn new(window: usize) -> Result<Self, DetectorError> {
        if window == 0 || window % 2 == 0 {
            return Err(DetectorError::InvalidMedianWindow(window));
        }
        Ok(Self {
            history: vec![0; window],
            scratch: vec![0; window],
            index: 0,
        })
    }

    /// Insert a sample and return the median of the last `window` inputs.
    pub fn process(&mut self, sample: i16) -> i16 {
        self.history[self.index] = sample;
        self.index = (self.index + 1) % self.history.len();

        self.scratch.copy_from_slice(&self.history);
        self.scratch.sort_unstable();
        self.scratch[self.history.len() / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_even_and_zero_windows() {
        assert!(MedianFilter::new(0).is_err());
        assert!(MedianFilter::new(4).is_err());
        assert!(MedianFilter::new(15).is_ok());
    }

    #[test]
    fn output_is_median_of_window() {
        // Property 4: output at step n is the median of the last W inputs,
        // zero-padded while the history is still filling.
        let mut filt = MedianFilter::new(5).unwrap();
        let input: Vec<i16> = vec![10, -3, 7, 100, 2, 2, -50, 8, 8, 8, 1];
        let mut window = vec![0i16; 5];
        for (n, &x) in input.iter().enumerate() {
            window[n % 5] = x;
            let mut sorted = window.clone();
            sorted.sort_unstable();
            assert_eq!(filt.process(x), sorted[2], "at step {}", n);
        }
    }

    #[test]
    fn suppresses_short_spikes() {
        let mut filt = MedianFilter::new(15).unwrap();
        for _ in 0..20 {
            filt.process(0);
        }
        // A 3-sample spike never reaches the output of a 15-wide median
        let mut peak = 0;
        for _ in 0..3 {
            peak = peak.max(filt.process(20000));
        }
        for _ in 0..20 {
            peak = peak.max(filt.process(0));
        }
        assert_eq!(peak, 0);
    }
}
