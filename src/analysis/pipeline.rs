// FeaturePipeline - per-block feature frame orchestration
//
// Runs the analysis stages in a fixed order over one sample block and
// assembles the results into a single PitchFrame:
//
//   raw loudness -> articulation (on raw loudness, so detection does not
//   lag behind smoothing) -> pitch -> raw cents (confidence-gated) ->
//   smoothing -> spectral features -> brightness smoothing -> pitch
//   stability -> frame assembly
//
// The pipeline has no fallible path: every stage degrades locally and
// process() always returns a valid frame. Per-stage wall-clock durations
// are tracked for diagnostics only.

use std::collections::VecDeque;
use std::time::Instant;

use crate::analysis::articulation::ArticulationTracker;
use crate::analysis::fft::SpectrumProvider;
use crate::analysis::level::{cents_deviation, linear_to_db, rms};
use crate::analysis::pitch::PitchDetector;
use crate::analysis::smoothing::{Ema, ScalarKalman};
use crate::analysis::spectral::SpectralAnalyzer;
use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::frame::PitchFrame;

/// Last and running-average duration of one pipeline stage
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTiming {
    pub last_us: f64,
    pub avg_us: f64,
    pub calls: u64,
}

impl StageTiming {
    fn record(&mut self, started: Instant) {
        let us = started.elapsed().as_secs_f64() * 1e6;
        self.last_us = us;
        self.calls += 1;
        self.avg_us += (us - self.avg_us) / self.calls as f64;
    }
}

/// Per-stage timing snapshot; observational only
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub loudness: StageTiming,
    pub articulation: StageTiming,
    pub pitch: StageTiming,
    pub smoothing: StageTiming,
    pub spectral: StageTiming,
    pub total: StageTiming,
}

pub struct FeaturePipeline {
    config: PipelineConfig,
    sample_rate: u32,
    pitch: PitchDetector,
    articulation: ArticulationTracker,
    cents_filter: ScalarKalman,
    brightness_filter: ScalarKalman,
    volume_db_ema: Ema,
    volume_linear_ema: Ema,
    spectral: SpectralAnalyzer,
    /// Raw cents of recent confidently-voiced frames, oldest first
    cents_history: VecDeque<f32>,
    last_frame: PitchFrame,
    timings: StageTimings,
}

impl FeaturePipeline {
    /// Pipeline with the internal FFT transform
    pub fn new(config: PipelineConfig, sample_rate: u32) -> Result<Self, ConfigError> {
        let spectral = SpectralAnalyzer::new(config.spectral.clone(), sample_rate)?;
        Self::assemble(config, sample_rate, spectral)
    }

    /// Pipeline over a caller-chosen spectrum transform
    pub fn with_provider(
        config: PipelineConfig,
        sample_rate: u32,
        provider: Box<dyn SpectrumProvider + Send>,
    ) -> Result<Self, ConfigError> {
        let spectral =
            SpectralAnalyzer::with_provider(config.spectral.clone(), sample_rate, provider)?;
        Self::assemble(config, sample_rate, spectral)
    }

    fn assemble(
        config: PipelineConfig,
        sample_rate: u32,
        spectral: SpectralAnalyzer,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.stability_window;
        Ok(Self {
            pitch: PitchDetector::new(config.pitch.clone())?,
            articulation: ArticulationTracker::new(config.articulation.clone())?,
            cents_filter: ScalarKalman::new(config.filters.cents),
            brightness_filter: ScalarKalman::new(config.filters.brightness),
            volume_db_ema: Ema::new(config.filters.volume_alpha),
            volume_linear_ema: Ema::new(config.filters.volume_alpha),
            spectral,
            cents_history: VecDeque::with_capacity(capacity),
            last_frame: PitchFrame::silent(0.0),
            timings: StageTimings::default(),
            config,
            sample_rate,
        })
    }

    /// Process one sample block into a feature frame
    ///
    /// Never fails: degenerate input degrades the affected stages to their
    /// documented defaults and the frame is still produced. `timestamp_ms`
    /// must increase monotonically across calls on the same pipeline.
    pub fn process(&mut self, block: &[f32], timestamp_ms: f64) -> PitchFrame {
        let total_start = Instant::now();

        let stage = Instant::now();
        let raw_linear = rms(block);
        let raw_db = linear_to_db(raw_linear);
        self.timings.loudness.record(stage);

        // Articulation sees raw loudness; smoothing would delay onsets
        let stage = Instant::now();
        let articulation = self.articulation.update(raw_db, timestamp_ms);
        let attack_time_ms = self.articulation.attack_elapsed_ms(timestamp_ms);
        self.timings.articulation.record(stage);

        let stage = Instant::now();
        let estimate = self.pitch.detect(block, self.sample_rate);
        self.timings.pitch.record(stage);
        let (frequency, confidence) = match estimate {
            Some(e) => (e.frequency, e.confidence),
            None => (0.0, 0.0),
        };

        // Cents only count when the detection is confident; unvoiced frames
        // contribute zero and stay out of the stability window
        let voiced = confidence > self.config.confidence_floor;
        let raw_cents = if voiced { cents_deviation(frequency) } else { 0.0 };

        let stage = Instant::now();
        let cents = self.cents_filter.update(raw_cents);
        let volume_db = self.volume_db_ema.update(raw_db);
        let volume_linear = self.volume_linear_ema.update(raw_linear);
        self.timings.smoothing.record(stage);

        let stage = Instant::now();
        let snapshot = self.spectral.analyze(block);
        let brightness = self.brightness_filter.update(snapshot.brightness);
        self.timings.spectral.record(stage);

        if voiced {
            if self.cents_history.len() == self.config.stability_window {
                self.cents_history.pop_front();
            }
            self.cents_history.push_back(raw_cents);
        }
        let pitch_stability = self.stability();

        let nyquist = self.sample_rate as f32 / 2.0;
        let last = &self.last_frame;
        let frame = PitchFrame {
            timestamp_ms: if timestamp_ms.is_finite() {
                timestamp_ms
            } else {
                last.timestamp_ms
            },
            frequency: finite_or(frequency, last.frequency).clamp(0.0, 10_000.0),
            confidence: finite_or(confidence, 0.0).clamp(0.0, 1.0),
            volume_db: finite_or(volume_db, last.volume_db).clamp(-100.0, 10.0),
            volume_linear: finite_or(volume_linear, last.volume_linear).clamp(0.0, 2.0),
            cents: finite_or(cents, last.cents).clamp(-100.0, 100.0),
            pitch_stability: finite_or(pitch_stability, 1.0).clamp(0.0, 1.0),
            articulation,
            attack_time_ms: finite_or(attack_time_ms, 0.0).max(0.0),
            spectral_centroid: finite_or(snapshot.centroid, last.spectral_centroid)
                .clamp(0.0, nyquist),
            brightness: finite_or(brightness, last.brightness).clamp(0.0, 1.0),
            formant: finite_or(snapshot.formant, last.formant).clamp(500.0, 3000.0),
            breathiness: finite_or(snapshot.breathiness, last.breathiness).clamp(0.0, 1.0),
        };

        self.last_frame = frame;
        self.timings.total.record(total_start);
        frame
    }

    /// 1 / (1 + variance of the cents history); 1.0 until the history
    /// holds at least 3 qualifying samples
    fn stability(&self) -> f32 {
        if self.cents_history.len() < 3 {
            return 1.0;
        }
        let n = self.cents_history.len() as f32;
        let mean = self.cents_history.iter().sum::<f32>() / n;
        let variance = self
            .cents_history
            .iter()
            .map(|c| (c - mean).powi(2))
            .sum::<f32>()
            / n;
        1.0 / (1.0 + variance)
    }

    /// Return every component to its initial state for stream reuse
    ///
    /// Keeps allocations; a stopped and restarted stream does not pay for
    /// reconstruction.
    pub fn reset(&mut self) {
        self.pitch.reset();
        self.articulation.reset();
        self.cents_filter.reset();
        self.brightness_filter.reset();
        self.volume_db_ema.reset();
        self.volume_linear_ema.reset();
        self.spectral.reset();
        self.cents_history.clear();
        self.last_frame = PitchFrame::silent(0.0);
        self.timings = StageTimings::default();
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Per-stage timing diagnostics
    pub fn timings(&self) -> StageTimings {
        self.timings
    }

    /// Articulation state-change count (diagnostics)
    pub fn state_changes(&self) -> u64 {
        self.articulation.state_changes()
    }

    /// Articulation attack-entry count (diagnostics)
    pub fn attack_entries(&self) -> u64 {
        self.articulation.attack_entries()
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
