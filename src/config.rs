//! Configuration for the feature-extraction pipeline
//!
//! Every tunable lives in an explicit struct with named fields and a
//! documented legal range. Values are validated when a component is
//! constructed; an out-of-range parameter is rejected with a [`ConfigError`]
//! rather than silently clamped. A JSON file can override the defaults for
//! fast tuning without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pitch: PitchConfig,
    pub articulation: ArticulationConfig,
    pub filters: FilterConfig,
    pub spectral: SpectralConfig,
    /// Capacity of the rolling raw-cents history behind `pitch_stability`
    pub stability_window: usize,
    /// Minimum pitch confidence for a frame's cents to count as voiced
    pub confidence_floor: f32,
}

/// YIN pitch-estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Absolute threshold on the normalized difference function, in (0, 1).
    /// Lower values demand a cleaner periodicity before a lag is accepted.
    pub threshold: f32,
    /// Minimum confidence (1 - d'(tau)) to report a pitch at all, in [0, 1]
    pub probability_floor: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            probability_floor: 0.1,
        }
    }
}

impl PitchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::PitchThreshold {
                got: self.threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.probability_floor) {
            return Err(ConfigError::ProbabilityFloor {
                got: self.probability_floor,
            });
        }
        Ok(())
    }
}

/// Articulation state-machine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticulationConfig {
    /// dB rise above the recent average that triggers an attack
    pub energy_threshold_db: f32,
    /// Loudness below which a frame counts as silent, dB
    pub silence_threshold_db: f32,
    /// How long the attack state is held before sustain, ms
    pub attack_duration_ms: f32,
    /// Continuous sub-threshold time that forces the silence state, ms
    pub min_silence_ms: f32,
    /// Number of recent loudness values kept for the rolling average
    pub history_window: usize,
}

impl Default for ArticulationConfig {
    fn default() -> Self {
        Self {
            energy_threshold_db: 10.0,
            silence_threshold_db: -50.0,
            attack_duration_ms: 80.0,
            min_silence_ms: 150.0,
            history_window: 8,
        }
    }
}

impl ArticulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.energy_threshold_db > 0.0) {
            return Err(ConfigError::EnergyThreshold {
                got: self.energy_threshold_db,
            });
        }
        if !(-100.0..=10.0).contains(&self.silence_threshold_db) {
            return Err(ConfigError::SilenceThreshold {
                got: self.silence_threshold_db,
            });
        }
        if !(self.attack_duration_ms > 0.0) {
            return Err(ConfigError::Duration {
                name: "attack_duration_ms",
                got: self.attack_duration_ms,
            });
        }
        if !(self.min_silence_ms > 0.0) {
            return Err(ConfigError::Duration {
                name: "min_silence_ms",
                got: self.min_silence_ms,
            });
        }
        if self.history_window < 2 {
            return Err(ConfigError::HistoryWindow {
                got: self.history_window,
            });
        }
        Ok(())
    }
}

/// Smoothing-filter parameters
///
/// Separate Kalman tunings for cents and brightness: cents needs to track
/// vibrato, brightness drifts slowly and tolerates heavier smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub cents: KalmanConfig,
    pub brightness: KalmanConfig,
    /// EMA alpha for loudness smoothing, in (0, 1]. Larger = less smoothing.
    pub volume_alpha: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cents: KalmanConfig {
                process_noise: 0.01,
                measurement_noise: 0.5,
                initial_estimate: 0.0,
                initial_covariance: 1.0,
            },
            brightness: KalmanConfig {
                process_noise: 0.005,
                measurement_noise: 0.3,
                initial_estimate: 0.0,
                initial_covariance: 1.0,
            },
            volume_alpha: 0.3,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cents.validate()?;
        self.brightness.validate()?;
        if !(self.volume_alpha > 0.0 && self.volume_alpha <= 1.0) {
            return Err(ConfigError::EmaAlpha {
                got: self.volume_alpha,
            });
        }
        Ok(())
    }
}

/// Parameters of one scalar Kalman-style estimator
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KalmanConfig {
    /// Process noise Q. Higher = faster tracking, more residual noise.
    pub process_noise: f32,
    /// Measurement noise R. Higher = heavier smoothing, more lag.
    pub measurement_noise: f32,
    pub initial_estimate: f32,
    /// Initial error covariance P
    pub initial_covariance: f32,
}

impl KalmanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.process_noise > 0.0) {
            return Err(ConfigError::FilterNoise {
                name: "process_noise",
                got: self.process_noise,
            });
        }
        if !(self.measurement_noise > 0.0) {
            return Err(ConfigError::FilterNoise {
                name: "measurement_noise",
                got: self.measurement_noise,
            });
        }
        Ok(())
    }
}

/// Spectral feature-extractor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Transform size in samples; power of two, >= 32
    pub fft_size: usize,
    /// Lower edge of the analyzed band, Hz
    pub min_frequency: f32,
    /// Upper edge of the analyzed band, Hz
    pub max_frequency: f32,
    /// Run the transform every Nth call; skipped calls reuse the last result
    pub compute_interval: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            min_frequency: 80.0,
            max_frequency: 8000.0,
            compute_interval: 2,
        }
    }
}

impl SpectralConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(ConfigError::FftSize { got: self.fft_size });
        }
        if !(self.min_frequency >= 0.0 && self.min_frequency < self.max_frequency) {
            return Err(ConfigError::FrequencyBand {
                min: self.min_frequency,
                max: self.max_frequency,
            });
        }
        if self.compute_interval < 1 {
            return Err(ConfigError::ComputeInterval {
                got: self.compute_interval,
            });
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pitch: PitchConfig::default(),
            articulation: ArticulationConfig::default(),
            filters: FilterConfig::default(),
            spectral: SpectralConfig::default(),
            stability_window: 10,
            confidence_floor: 0.5,
        }
    }
}

impl PipelineConfig {
    /// Check every parameter against its documented range
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pitch.validate()?;
        self.articulation.validate()?;
        self.filters.validate()?;
        self.spectral.validate()?;
        if self.stability_window < 3 {
            return Err(ConfigError::HistoryWindow {
                got: self.stability_window,
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(ConfigError::ProbabilityFloor {
                got: self.confidence_floor,
            });
        }
        Ok(())
    }

    /// Load configuration overrides from a JSON file
    ///
    /// A missing or unparsable file falls back to the defaults with a
    /// warning. A file that parses but carries out-of-range values is a
    /// configuration error and is rejected, not defaulted.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PipelineConfig>(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }
}
