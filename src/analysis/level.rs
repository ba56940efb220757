// Level module - loudness and pitch-deviation scalar utilities
//
// Small stateless helpers shared by the pipeline stages: RMS amplitude,
// linear/dB conversion pinned to the [-100, 10] dB loudness domain, and
// cents deviation from the nearest equal-tempered semitone.

/// Loudness floor in dB; anything quieter (including digital silence)
/// reports this value.
pub const DB_FLOOR: f32 = -100.0;

/// Loudness ceiling in dB
pub const DB_CEILING: f32 = 10.0;

/// A4 reference frequency, Hz
const A4_HZ: f32 = 440.0;

/// Root-mean-square amplitude of a block
///
/// Non-finite samples are skipped so a stray NaN cannot poison the sum.
/// Empty blocks report 0.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for &s in samples {
        if s.is_finite() {
            sum += (s as f64) * (s as f64);
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt() as f32
}

/// Convert a linear amplitude to dB, clamped to [-100, 10]
pub fn linear_to_db(amplitude: f32) -> f32 {
    if !(amplitude > 0.0) || !amplitude.is_finite() {
        return DB_FLOOR;
    }
    (20.0 * amplitude.log10()).clamp(DB_FLOOR, DB_CEILING)
}

/// Deviation of `frequency` from the nearest equal-tempered semitone, in
/// cents. Result is in [-50, 50]; non-positive or non-finite frequencies
/// report 0.
pub fn cents_deviation(frequency: f32) -> f32 {
    if !(frequency > 0.0) || !frequency.is_finite() {
        return 0.0;
    }
    let semitones = 12.0 * (frequency / A4_HZ).log2();
    (semitones - semitones.round()) * 100.0
}
