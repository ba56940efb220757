// Offline harness: run the feature pipeline over a WAV file and print one
// JSON frame per block. Stands in for the live audio-capture collaborator
// when tuning thresholds or inspecting a recording.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use monopitch::{FeaturePipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(
    name = "monopitch_cli",
    about = "Extract per-block pitch/loudness/timbre frames from a WAV file"
)]
struct Cli {
    /// Input WAV file (mono or multi-channel; channels are averaged)
    wav: PathBuf,

    /// Samples per analysis block
    #[arg(long, default_value_t = 2048)]
    block_size: usize,

    /// JSON config file overriding the default parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print per-stage timing averages to stderr after processing
    #[arg(long)]
    timings: bool,
}

fn main() -> ExitCode {
    monopitch::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let (samples, sample_rate) = read_wav_mono(&cli.wav)?;
    let mut pipeline = FeaturePipeline::new(config, sample_rate)?;

    let block_ms = cli.block_size as f64 * 1000.0 / sample_rate as f64;
    let mut timestamp_ms = 0.0;
    for block in samples.chunks(cli.block_size) {
        let frame = pipeline.process(block, timestamp_ms);
        println!("{}", serde_json::to_string(&frame)?);
        timestamp_ms += block_ms;
    }

    if cli.timings {
        let timings = pipeline.timings();
        eprintln!(
            "stage averages (us): loudness={:.1} articulation={:.1} pitch={:.1} \
             smoothing={:.1} spectral={:.1} total={:.1} over {} blocks",
            timings.loudness.avg_us,
            timings.articulation.avg_us,
            timings.pitch.avg_us,
            timings.smoothing.avg_us,
            timings.spectral.avg_us,
            timings.total.avg_us,
            timings.total.calls,
        );
    }

    Ok(ExitCode::from(0))
}

/// Read a WAV file as mono f32, averaging channels
fn read_wav_mono(path: &PathBuf) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .context("decoding float samples")?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .context("decoding integer samples")?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}
