// PitchFrame - the immutable per-block output record
//
// One frame is produced per processed sample block and combines pitch,
// loudness, articulation, and timbre into a single plain value. Frames are
// Copy and never mutated after construction; downstream consumers own the
// frames they receive and the pipeline keeps no reference to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Onset-lifecycle state of the current sound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Articulation {
    Silence,
    Attack,
    Sustain,
    Release,
}

/// Features extracted from one sample block
///
/// Every numeric field is finite and inside its documented domain; the
/// pipeline substitutes the previous frame's value or a default before a
/// frame is published, so consumers never see NaN or infinity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PitchFrame {
    /// Monotonic block time, ms
    pub timestamp_ms: f64,

    /// Estimated fundamental frequency in Hz; 0 when no pitch was found.
    /// Domain [0, 10000].
    pub frequency: f32,

    /// Reliability of `frequency`, [0, 1]
    pub confidence: f32,

    /// Smoothed loudness in dB, [-100, 10]
    pub volume_db: f32,

    /// Smoothed RMS amplitude, [0, 2]
    pub volume_linear: f32,

    /// Smoothed deviation from the nearest equal-tempered semitone,
    /// [-100, 100] cents
    pub cents: f32,

    /// 1 / (1 + variance of recent raw cents); 1 = stable. [0, 1].
    pub pitch_stability: f32,

    /// Current articulation state
    pub articulation: Articulation,

    /// Time since entering attack, ms; 0 outside attack/sustain
    pub attack_time_ms: f32,

    /// Magnitude-weighted mean frequency, Hz. Domain [0, nyquist].
    pub spectral_centroid: f32,

    /// Centroid normalized to Nyquist, [0, 1]
    pub brightness: f32,

    /// Coarse formant proxy (clamped centroid), [500, 3000] Hz
    pub formant: f32,

    /// Spectral flatness in the analyzed band, [0, 1]
    pub breathiness: f32,
}

/// A frame field outside its declared domain, or non-finite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidField {
    pub field: &'static str,
    pub value: f32,
}

impl fmt::Display for InvalidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame field {} out of range: {}", self.field, self.value)
    }
}

impl std::error::Error for InvalidField {}

impl PitchFrame {
    /// The frame emitted for a stream that has produced nothing yet
    pub fn silent(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            frequency: 0.0,
            confidence: 0.0,
            volume_db: -100.0,
            volume_linear: 0.0,
            cents: 0.0,
            pitch_stability: 1.0,
            articulation: Articulation::Silence,
            attack_time_ms: 0.0,
            spectral_centroid: 0.0,
            brightness: 0.0,
            formant: 500.0,
            breathiness: 0.5,
        }
    }

    /// Check every field against its declared domain
    ///
    /// `nyquist` bounds the centroid; pass `sample_rate / 2`. Non-finite
    /// values fail for whichever field carries them.
    pub fn validate(&self, nyquist: f32) -> Result<(), InvalidField> {
        check("frequency", self.frequency, 0.0, 10_000.0)?;
        check("confidence", self.confidence, 0.0, 1.0)?;
        check("volume_db", self.volume_db, -100.0, 10.0)?;
        check("volume_linear", self.volume_linear, 0.0, 2.0)?;
        check("cents", self.cents, -100.0, 100.0)?;
        check("pitch_stability", self.pitch_stability, 0.0, 1.0)?;
        check("attack_time_ms", self.attack_time_ms, 0.0, f32::MAX)?;
        check("spectral_centroid", self.spectral_centroid, 0.0, nyquist)?;
        check("brightness", self.brightness, 0.0, 1.0)?;
        check("formant", self.formant, 500.0, 3000.0)?;
        check("breathiness", self.breathiness, 0.0, 1.0)?;
        if !self.timestamp_ms.is_finite() {
            return Err(InvalidField {
                field: "timestamp_ms",
                value: self.timestamp_ms as f32,
            });
        }
        Ok(())
    }
}

fn check(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), InvalidField> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(InvalidField { field, value })
    }
}
