// PitchDetector - YIN fundamental-frequency estimation
//
// Estimates the fundamental frequency of one monophonic sample block with
// the YIN algorithm:
// 1. Squared-difference function d(tau) = sum (x[i] - x[i+tau])^2 for lags
//    up to half the block length
// 2. Cumulative-mean-normalized difference d'(tau) = d(tau) * tau / sum d,
//    d'(0) = 1
// 3. Scan for the first lag below the threshold, then follow the function
//    downhill to the local minimum (avoids octave errors)
// 4. Parabolic interpolation over the three neighboring values refines the
//    lag to sub-sample precision
//
// frequency = sample_rate / refined_lag, confidence = 1 - d'(tau).
// Frequency bounds are the caller's concern, set via block length and
// threshold.
//
// Reference: de Cheveigne, A. & Kawahara, H. (2002). YIN, a fundamental
// frequency estimator for speech and music.

use crate::config::PitchConfig;
use crate::error::ConfigError;

/// One pitch detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Fundamental frequency, Hz
    pub frequency: f32,
    /// Reliability of the estimate, [0, 1]
    pub confidence: f32,
}

pub struct PitchDetector {
    config: PitchConfig,
    // Scratch buffers, grown once to half the largest block seen and
    // reused every call
    diff: Vec<f32>,
    cmnd: Vec<f32>,
}

impl PitchDetector {
    pub fn new(config: PitchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            diff: Vec::new(),
            cmnd: Vec::new(),
        })
    }

    /// Estimate the fundamental frequency of one block
    ///
    /// Returns `None` for degenerate blocks (fewer than 2 samples, all-zero,
    /// non-finite content) and when no lag is periodic enough to clear the
    /// configured threshold and probability floor.
    pub fn detect(&mut self, block: &[f32], sample_rate: u32) -> Option<PitchEstimate> {
        let n = block.len();
        let max_tau = n / 2;
        if n < 2 || max_tau < 2 || sample_rate == 0 {
            return None;
        }
        if block.iter().any(|s| !s.is_finite()) {
            return None;
        }
        if block.iter().all(|&s| s == 0.0) {
            return None;
        }

        self.difference_function(block, max_tau);
        self.normalize_difference(max_tau);

        let tau = self.find_best_lag(max_tau)?;
        let confidence = (1.0 - self.cmnd[tau]).clamp(0.0, 1.0);
        if confidence < self.config.probability_floor {
            return None;
        }

        let refined = self.parabolic_interpolation(tau);
        if !(refined > 0.0) {
            return None;
        }
        let frequency = sample_rate as f32 / refined;
        if !frequency.is_finite() {
            return None;
        }

        Some(PitchEstimate {
            frequency,
            confidence,
        })
    }

    /// d(tau) for tau in [0, max_tau)
    fn difference_function(&mut self, block: &[f32], max_tau: usize) {
        let n = block.len();
        self.diff.clear();
        self.diff.resize(max_tau, 0.0);
        for tau in 1..max_tau {
            let mut sum = 0.0f32;
            for i in 0..n - tau {
                let delta = block[i] - block[i + tau];
                sum += delta * delta;
            }
            self.diff[tau] = sum;
        }
    }

    /// d'(tau) = d(tau) * tau / sum_{1..tau} d(k), with d'(0) = 1
    fn normalize_difference(&mut self, max_tau: usize) {
        self.cmnd.clear();
        self.cmnd.resize(max_tau, 0.0);
        self.cmnd[0] = 1.0;
        let mut running_sum = 0.0f32;
        for tau in 1..max_tau {
            running_sum += self.diff[tau];
            if running_sum > 0.0 {
                self.cmnd[tau] = self.diff[tau] * tau as f32 / running_sum;
            } else {
                // Perfectly flat prefix (constant signal); no periodicity
                // information at this lag
                self.cmnd[tau] = 1.0;
            }
        }
    }

    /// First lag below the threshold, refined downhill to the local minimum
    fn find_best_lag(&self, max_tau: usize) -> Option<usize> {
        let mut tau = 2;
        while tau < max_tau {
            if self.cmnd[tau] < self.config.threshold {
                // Keep descending while the function still decreases, so a
                // shallow early dip does not win over the true period
                while tau + 1 < max_tau && self.cmnd[tau + 1] < self.cmnd[tau] {
                    tau += 1;
                }
                return Some(tau);
            }
            tau += 1;
        }
        None
    }

    /// Refine an integer lag with a parabola through its three neighbors
    fn parabolic_interpolation(&self, tau: usize) -> f32 {
        if tau == 0 || tau + 1 >= self.cmnd.len() {
            return tau as f32;
        }
        let y1 = self.cmnd[tau - 1];
        let y2 = self.cmnd[tau];
        let y3 = self.cmnd[tau + 1];
        let denom = y1 - 2.0 * y2 + y3;
        if denom.abs() < 1e-12 {
            return tau as f32;
        }
        tau as f32 + 0.5 * (y1 - y3) / denom
    }

    /// Drop the scratch buffers; they regrow on the next call
    pub fn reset(&mut self) {
        self.diff.clear();
        self.cmnd.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PitchDetector {
        PitchDetector::new(PitchConfig::default()).unwrap()
    }

    fn sine(sample_rate: u32, frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_sine_within_one_percent() {
        let mut detector = detector();
        for &freq in &[110.0f32, 220.0, 440.0, 880.0] {
            let signal = sine(44_100, freq, 2048);
            let estimate = detector
                .detect(&signal, 44_100)
                .unwrap_or_else(|| panic!("no pitch for {} Hz sine", freq));
            assert!(
                (estimate.frequency - freq).abs() / freq < 0.01,
                "{} Hz sine detected as {} Hz",
                freq,
                estimate.frequency
            );
            assert!(
                estimate.confidence >= 0.8,
                "confidence {} too low for clean {} Hz sine",
                estimate.confidence,
                freq
            );
        }
    }

    #[test]
    fn test_440_scenario() {
        let mut detector = detector();
        let signal = sine(44_100, 440.0, 2048);
        let estimate = detector.detect(&signal, 44_100).unwrap();
        assert!(
            estimate.frequency >= 435.0 && estimate.frequency <= 445.0,
            "440 Hz sine detected as {} Hz",
            estimate.frequency
        );
        assert!(estimate.confidence > 0.8);
    }

    #[test]
    fn test_silence_reports_no_pitch() {
        let mut detector = detector();
        assert_eq!(detector.detect(&vec![0.0; 2048], 44_100), None);
    }

    #[test]
    fn test_degenerate_blocks_report_no_pitch() {
        let mut detector = detector();
        assert_eq!(detector.detect(&[], 44_100), None);
        assert_eq!(detector.detect(&[0.5], 44_100), None);
        assert_eq!(detector.detect(&[0.5, -0.5, 0.3], 44_100), None);
        assert_eq!(detector.detect(&sine(44_100, 440.0, 2048), 0), None);
    }

    #[test]
    fn test_non_finite_samples_report_no_pitch() {
        let mut detector = detector();
        let mut signal = sine(44_100, 440.0, 2048);
        signal[1000] = f32::NAN;
        assert_eq!(detector.detect(&signal, 44_100), None);
    }

    #[test]
    fn test_constant_signal_reports_no_pitch() {
        let mut detector = detector();
        assert_eq!(detector.detect(&vec![0.7; 2048], 44_100), None);
    }

    #[test]
    fn test_octave_refinement_prefers_fundamental() {
        // A sawtooth has strong harmonics; the downhill refinement should
        // still land on the fundamental rather than an upper octave
        let sample_rate = 44_100u32;
        let freq = 220.0f32;
        let signal: Vec<f32> = (0..2048)
            .map(|i| {
                let phase = (i as f32 * freq / sample_rate as f32).fract();
                2.0 * phase - 1.0
            })
            .collect();

        let mut detector = detector();
        let estimate = detector.detect(&signal, sample_rate).unwrap();
        assert!(
            (estimate.frequency - freq).abs() / freq < 0.02,
            "sawtooth at {} Hz detected as {} Hz",
            freq,
            estimate.frequency
        );
    }

    #[test]
    fn test_detector_reusable_across_block_sizes() {
        let mut detector = detector();
        let first = detector.detect(&sine(48_000, 330.0, 2048), 48_000).unwrap();
        let second = detector.detect(&sine(48_000, 330.0, 1024), 48_000).unwrap();
        assert!((first.frequency - second.frequency).abs() < 5.0);

        detector.reset();
        let third = detector.detect(&sine(48_000, 330.0, 2048), 48_000).unwrap();
        assert!((first.frequency - third.frequency).abs() < 0.01);
    }
}
