// Error types for the monopitch feature-extraction crate
//
// Configuration problems are the only user-visible failures: every value is
// checked when a component is constructed, and an out-of-range parameter is
// rejected with a descriptive error rather than clamped. Runtime degradation
// (bad blocks, failed transforms) never surfaces as an error; those paths
// fall back to documented defaults inside the affected stage.

use std::fmt;

/// Configuration rejected at construction time
///
/// Each variant names the offending parameter, the value that was supplied,
/// and the legal range, so the message alone is enough to fix the config.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// YIN threshold must be in (0, 1)
    PitchThreshold { got: f32 },

    /// Pitch confidence floor must be in [0, 1]
    ProbabilityFloor { got: f32 },

    /// Onset energy threshold must be positive (dB)
    EnergyThreshold { got: f32 },

    /// Silence threshold must be within the loudness domain [-100, 10] dB
    SilenceThreshold { got: f32 },

    /// A duration parameter must be positive
    Duration { name: &'static str, got: f32 },

    /// Loudness history window must hold at least 2 samples
    HistoryWindow { got: usize },

    /// Kalman process/measurement noise must be positive
    FilterNoise { name: &'static str, got: f32 },

    /// EMA alpha must be in (0, 1]
    EmaAlpha { got: f32 },

    /// FFT size must be a power of two, at least 32
    FftSize { got: usize },

    /// Spectral analysis band must satisfy 0 <= min < max
    FrequencyBand { min: f32, max: f32 },

    /// Spectral compute interval must be at least 1
    ComputeInterval { got: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PitchThreshold { got } => {
                write!(f, "pitch threshold must be in (0, 1), got {}", got)
            }
            ConfigError::ProbabilityFloor { got } => {
                write!(f, "probability floor must be in [0, 1], got {}", got)
            }
            ConfigError::EnergyThreshold { got } => {
                write!(f, "energy threshold must be > 0 dB, got {}", got)
            }
            ConfigError::SilenceThreshold { got } => {
                write!(f, "silence threshold must be in [-100, 10] dB, got {}", got)
            }
            ConfigError::Duration { name, got } => {
                write!(f, "{} must be > 0 ms, got {}", name, got)
            }
            ConfigError::HistoryWindow { got } => {
                write!(f, "loudness history window must be >= 2, got {}", got)
            }
            ConfigError::FilterNoise { name, got } => {
                write!(f, "{} must be > 0, got {}", name, got)
            }
            ConfigError::EmaAlpha { got } => {
                write!(f, "EMA alpha must be in (0, 1], got {}", got)
            }
            ConfigError::FftSize { got } => {
                write!(f, "FFT size must be a power of two >= 32, got {}", got)
            }
            ConfigError::FrequencyBand { min, max } => {
                write!(
                    f,
                    "frequency band must satisfy 0 <= min < max, got [{}, {}]",
                    min, max
                )
            }
            ConfigError::ComputeInterval { got } => {
                write!(f, "spectral compute interval must be >= 1, got {}", got)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure of an underlying spectrum transform
///
/// Caught at the spectral-extractor boundary and converted to last-good or
/// default values; never propagated out of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumError {
    /// Input block too short to analyze
    BlockTooShort { got: usize, needed: usize },

    /// Host-supplied spectrum had the wrong number of bins
    BinCountMismatch { got: usize, expected: usize },

    /// Host-supplied spectrum was unavailable this call
    Unavailable,
}

impl fmt::Display for SpectrumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpectrumError::BlockTooShort { got, needed } => {
                write!(f, "block of {} samples, transform needs {}", got, needed)
            }
            SpectrumError::BinCountMismatch { got, expected } => {
                write!(f, "host spectrum has {} bins, expected {}", got, expected)
            }
            SpectrumError::Unavailable => write!(f, "host spectrum unavailable"),
        }
    }
}

impl std::error::Error for SpectrumError {}
