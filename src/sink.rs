//! Optional per-sample debug sinks.
//!
//! The detector can mirror its internal streams into caller-provided sinks
//! for offline inspection (typically 16-bit mono WAV files opened in an
//! audio editor alongside the raw capture). Sinks are owned by the caller;
//! an absent sink costs nothing on the hot path.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::DetectorError;

/// Per-sample debug stream contract.
pub trait SampleSink {
    fn write(&mut self, sample: i16);
}

/// WAV-backed sample sink (16-bit mono PCM).
///
/// hound writes the header with placeholder chunk sizes at creation and
/// patches the final sizes on `finalize` — after a crash the file stays
/// playable up to the last flushed sample, which is the point of a debug
/// dump. A failed write disables the sink; the detector keeps running.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
}

impl WavSink {
    /// Create a WAV sink at `path` with the detector's sample rate.
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, DetectorError> {
        if sample_rate == 0 {
            return Err(DetectorError::InvalidSampleRate);
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = path.as_ref().to_path_buf();
        match hound::WavWriter::create(&path, spec) {
            Ok(writer) => Ok(Self {
                writer: Some(writer),
                path,
            }),
            Err(e) => {
                // Resource errors leave the sink disabled rather than
                // propagating into the detector (it must keep running).
                tracing::warn!("could not open debug sink {:?}: {}", path, e);
                Ok(Self { writer: None, path })
            }
        }
    }

    /// Patch the header sizes and close the file.
    pub fn finalize(mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                tracing::warn!("could not finalize debug sink {:?}: {}", self.path, e);
            }
        }
    }
}

impl SampleSink for WavSink {
    fn write(&mut self, sample: i16) {
        if let Some(writer) = &mut self.writer {
            if let Err(e) = writer.write_sample(sample) {
                tracing::warn!("debug sink {:?} write failed, disabling: {}", self.path, e);
                self.writer = None;
            }
        }
    }
}

/// The detector's debug stream bundle. Every stream is optional.
#[derive(Default)]
pub struct DebugSinks {
    /// Smoothed AM envelope
    pub am: Option<Box<dyn SampleSink>>,
    /// Raw FM discriminator output
    pub fm: Option<Box<dyn SampleSink>>,
    /// FM peak-follower high threshold
    pub fm_thr_hi: Option<Box<dyn SampleSink>>,
    /// FM peak-follower low threshold
    pub fm_thr_lo: Option<Box<dyn SampleSink>>,
    /// Decoded AM square wave
    pub out_am: Option<Box<dyn SampleSink>>,
    /// Decoded FM square wave
    pub out_fm: Option<Box<dyn SampleSink>>,
}

impl DebugSinks {
    /// Open the full WAV bundle under `dir`, named after the streams.
    pub fn wav_bundle(dir: impl AsRef<Path>, sample_rate: u32) -> Result<Self, DetectorError> {
        let dir = dir.as_ref();
        let open = |name: &str| -> Result<Option<Box<dyn SampleSink>>, DetectorError> {
            Ok(Some(Box::new(WavSink::create(dir.join(name), sample_rate)?) as Box<dyn SampleSink>))
        };
        Ok(Self {
            am: open("am_smoothed.wav")?,
            fm: open("fm_raw.wav")?,
            fm_thr_hi: open("fm_thr_hi.wav")?,
            fm_thr_lo: open("fm_thr_lo.wav")?,
            out_am: open("out_am.wav")?,
            out_fm: open("out_fm.wav")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_sink_writes_and_finalizes() {
        let dir = std::env::temp_dir().join("pulsecap_sink_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("probe.wav");
        let mut sink = WavSink::create(&path, 250_000).unwrap();
        for s in [0i16, 100, -100, 32000] {
            sink.write(s);
        }
        sink.finalize();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 250_000);
        assert_eq!(reader.spec().channels, 1);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, vec![0, 100, -100, 32000]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        assert_eq!(
            WavSink::create("/tmp/never.wav", 0).err(),
            Some(DetectorError::InvalidSampleRate)
        );
    }

    #[test]
    fn unopenable_path_disables_the_sink() {
        // Writes to a disabled sink are no-ops, not panics
        let mut sink = WavSink::create("/nonexistent-dir/x/y.wav", 48_000).unwrap();
        sink.write(1);
        sink.write(2);
        sink.finalize();
    }
}
