//! pulsecap CLI — run the pulse detector over raw baseband dumps.
//!
//! Reads a pair of aligned raw i16 little-endian sample files (AM envelope +
//! FM discriminator, as produced by an SDR front end), streams them through
//! the detector in chunks, and emits the detected packages as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulsecap::detect::{FskMode, PulseDetector};
use pulsecap::package::{save_packages, PackageRecord};
use pulsecap::pulse_data::{PackageKind, PulseData};
use pulsecap::sink::DebugSinks;

/// Samples fed to the detector per call; exercises the same resume path a
/// live front end would.
const CHUNK_SAMPLES: usize = 65536;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FskModeArg {
    Classic,
    Minmax,
}

impl From<FskModeArg> for FskMode {
    fn from(arg: FskModeArg) -> Self {
        match arg {
            FskModeArg::Classic => FskMode::Classic,
            FskModeArg::Minmax => FskMode::Minmax,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pulsecap", version, about = "OOK/FSK pulse detector for SDR baseband dumps")]
struct Args {
    /// AM envelope samples (raw i16 little-endian)
    #[arg(long)]
    am: PathBuf,

    /// FM discriminator samples (raw i16 little-endian)
    #[arg(long)]
    fm: PathBuf,

    /// Sample rate in Hz
    #[arg(long, default_value_t = 250_000)]
    rate: u32,

    /// FSK sub-detection algorithm
    #[arg(long, value_enum, default_value = "classic")]
    fsk_mode: FskModeArg,

    /// Interpret configured dB levels with the magnitude (÷20) mapping
    #[arg(long)]
    mag: bool,

    /// Manual threshold override in dB; negative arms it
    #[arg(long, default_value_t = 0.0)]
    fixed_high_db: f32,

    /// Minimum high level estimate in dB
    #[arg(long, default_value_t = -12.0)]
    min_high_db: f32,

    /// High/low level ratio in dB
    #[arg(long, default_value_t = 9.0)]
    high_low_ratio_db: f32,

    /// Classical estimator thresholds instead of the peak follower
    #[arg(long)]
    classic_levels: bool,

    /// Directory for per-stream WAV debug dumps
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Write detected packages to this JSON file instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// More detector logging (-v levels, -vv transitions)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Read a raw i16 little-endian sample file.
fn read_samples(path: &Path) -> Result<Vec<i16>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    if bytes.len() % 2 != 0 {
        tracing::warn!("{:?} has an odd trailing byte, ignoring it", path);
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = match args.verbose {
        0 => "pulsecap=info",
        1 => "pulsecap=debug",
        _ => "pulsecap=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let envelope = read_samples(&args.am)?;
    let mut fm = read_samples(&args.fm)?;
    if fm.len() != envelope.len() {
        tracing::warn!(
            "stream length mismatch (am {} vs fm {}), padding/truncating fm",
            envelope.len(),
            fm.len()
        );
    }
    fm.resize(envelope.len(), 0);
    tracing::info!("Processing {} samples at {} Hz", envelope.len(), args.rate);

    let mut detector = PulseDetector::new()?;
    detector.set_levels(
        args.mag,
        args.fixed_high_db,
        args.min_high_db,
        args.high_low_ratio_db,
        args.verbose,
    );
    detector.set_classic_thresholds(args.classic_levels);
    if let Some(dir) = &args.debug_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create debug dir {:?}", dir))?;
        detector.set_debug_sinks(DebugSinks::wav_bundle(dir, args.rate)?);
        tracing::info!("Debug WAV dumps under {:?}", dir);
    }

    let fsk_mode: FskMode = args.fsk_mode.into();
    let mut pulses = PulseData::new();
    let mut fsk_pulses = PulseData::new();
    let mut packages = Vec::new();
    let mut offset = 0u64;

    for (env_chunk, fm_chunk) in envelope.chunks(CHUNK_SAMPLES).zip(fm.chunks(CHUNK_SAMPLES)) {
        while let Some(kind) = detector.detect(
            env_chunk,
            fm_chunk,
            args.rate,
            offset,
            &mut pulses,
            &mut fsk_pulses,
            fsk_mode,
        ) {
            let record = match kind {
                PackageKind::Ook => PackageRecord::from_pulse_data(kind, &pulses),
                PackageKind::Fsk => PackageRecord::from_pulse_data(kind, &fsk_pulses),
            };
            tracing::info!(
                "{} package at sample {}: {} pulses, {:.1} ms",
                record.kind,
                record.offset,
                record.pulses.len(),
                record.duration_ms()
            );
            packages.push(record);
        }
        offset += env_chunk.len() as u64;
    }

    tracing::info!(
        "Done: {} packages in {:.1} s of signal",
        packages.len(),
        envelope.len() as f64 / args.rate as f64
    );

    match &args.out {
        Some(path) => save_packages(path, &packages)?,
        None => println!("{}", serde_json::to_string_pretty(&packages)?),
    }

    // Dropping the detector finalizes any WAV debug sinks
    Ok(())
}
