// Analysis module - the per-block DSP pipeline
//
// Leaf modules compute individual features; pipeline.rs coordinates them
// into one PitchFrame per sample block.
//
// Module organization:
// - level: loudness and cents scalar utilities
// - smoothing: Kalman-style and EMA recursive estimators
// - articulation: loudness-driven note lifecycle state machine
// - pitch: YIN fundamental-frequency detector
// - fft: magnitude-spectrum providers (internal rustfft, host-supplied)
// - spectral: band-restricted timbre descriptors
// - pipeline: the orchestrator

pub mod articulation;
pub mod fft;
pub mod level;
pub mod pipeline;
pub mod pitch;
pub mod smoothing;
pub mod spectral;

pub use articulation::ArticulationTracker;
pub use fft::{FftSpectrumProvider, HostSpectrumProvider, HostTransform, SpectrumProvider};
pub use pipeline::{FeaturePipeline, StageTiming, StageTimings};
pub use pitch::{PitchDetector, PitchEstimate};
pub use smoothing::{Ema, ScalarKalman};
pub use spectral::{SpectralAnalyzer, SpectralSnapshot};
