// SpectralAnalyzer - frequency-domain timbre descriptors
//
// Computes spectral centroid, brightness, flatness ("breathiness"), and a
// coarse formant proxy from a magnitude spectrum restricted to a configured
// frequency band. The transform is the expensive part, so the analyzer can
// run it every Nth call and replay the last result in between. A transform
// failure degrades to the last good result; it never propagates out of the
// analyzer.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

use serde::{Deserialize, Serialize};

use crate::analysis::fft::{FftSpectrumProvider, SpectrumProvider};
use crate::config::SpectralConfig;
use crate::error::ConfigError;

/// Magnitudes below this count as zero throughout the band analysis
const MAG_EPSILON: f32 = 1e-10;

/// Flatness reported for a spectrum with no energy in the band
const FLATNESS_DEFAULT: f32 = 0.5;

/// Formant proxy clamp bounds, Hz
const FORMANT_MIN_HZ: f32 = 500.0;
const FORMANT_MAX_HZ: f32 = 3000.0;

/// Spectral descriptors of one analyzed block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralSnapshot {
    /// Magnitude-weighted mean frequency in the analyzed band, Hz
    pub centroid: f32,
    /// Centroid normalized to Nyquist, [0, 1]
    pub brightness: f32,
    /// Spectral flatness in the band, [0, 1]
    pub breathiness: f32,
    /// Centroid clamped to [500, 3000] Hz; a proxy, not a formant tracker
    pub formant: f32,
}

impl SpectralSnapshot {
    /// Values reported before any block has been analyzed, and for
    /// zero-energy spectra
    pub fn neutral() -> Self {
        Self {
            centroid: 0.0,
            brightness: 0.0,
            breathiness: FLATNESS_DEFAULT,
            formant: FORMANT_MIN_HZ,
        }
    }
}

pub struct SpectralAnalyzer {
    config: SpectralConfig,
    provider: Box<dyn SpectrumProvider + Send>,
    sample_rate: u32,
    calls: u64,
    last: SpectralSnapshot,
}

impl SpectralAnalyzer {
    /// Analyzer with the internal rustfft transform
    pub fn new(config: SpectralConfig, sample_rate: u32) -> Result<Self, ConfigError> {
        let provider = FftSpectrumProvider::new(config.fft_size)?;
        Self::with_provider(config, sample_rate, Box::new(provider))
    }

    /// Analyzer over a caller-chosen transform (e.g. a host-native FFT)
    pub fn with_provider(
        config: SpectralConfig,
        sample_rate: u32,
        provider: Box<dyn SpectrumProvider + Send>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            sample_rate,
            calls: 0,
            last: SpectralSnapshot::neutral(),
        })
    }

    /// Analyze one block, or replay the cached result on a skipped call
    pub fn analyze(&mut self, block: &[f32]) -> SpectralSnapshot {
        let due = self.calls % self.config.compute_interval as u64 == 0;
        self.calls += 1;
        if !due {
            return self.last;
        }

        match self.provider.magnitude_spectrum(block) {
            Ok(spectrum) => {
                let snapshot = Self::features_from_spectrum(
                    spectrum,
                    self.sample_rate,
                    self.config.fft_size,
                    self.config.min_frequency,
                    self.config.max_frequency,
                );
                self.last = snapshot;
                snapshot
            }
            Err(err) => {
                log::warn!("[Spectral] transform failed ({}), reusing last result", err);
                self.last
            }
        }
    }

    fn features_from_spectrum(
        spectrum: &[f32],
        sample_rate: u32,
        fft_size: usize,
        min_frequency: f32,
        max_frequency: f32,
    ) -> SpectralSnapshot {
        let nyquist = sample_rate as f32 / 2.0;
        let bin_width = sample_rate as f32 / fft_size as f32;

        let lo = (min_frequency / bin_width).ceil().max(0.0) as usize;
        let hi = ((max_frequency.min(nyquist) / bin_width).floor() as usize)
            .min(spectrum.len().saturating_sub(1));
        if lo > hi {
            return SpectralSnapshot::neutral();
        }
        let band = &spectrum[lo..=hi];

        let mut weighted_sum = 0.0f32;
        let mut magnitude_sum = 0.0f32;
        for (i, &mag) in band.iter().enumerate() {
            let freq = (lo + i) as f32 * bin_width;
            weighted_sum += freq * mag;
            magnitude_sum += mag;
        }
        if magnitude_sum <= MAG_EPSILON {
            return SpectralSnapshot::neutral();
        }

        let centroid = weighted_sum / magnitude_sum;
        let brightness = (centroid / nyquist).clamp(0.0, 1.0);
        let breathiness = Self::flatness(band);
        let formant = centroid.clamp(FORMANT_MIN_HZ, FORMANT_MAX_HZ);

        let snapshot = SpectralSnapshot {
            centroid,
            brightness,
            breathiness,
            formant,
        };
        if !centroid.is_finite() || !breathiness.is_finite() {
            return SpectralSnapshot::neutral();
        }
        snapshot
    }

    /// Flatness = geometric mean / arithmetic mean over nonzero magnitudes
    fn flatness(band: &[f32]) -> f32 {
        let mut log_sum = 0.0f32;
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for &mag in band {
            if mag > MAG_EPSILON {
                log_sum += mag.ln();
                sum += mag;
                count += 1;
            }
        }
        if count == 0 {
            return FLATNESS_DEFAULT;
        }
        let geometric = (log_sum / count as f32).exp();
        let arithmetic = sum / count as f32;
        if arithmetic <= MAG_EPSILON {
            return FLATNESS_DEFAULT;
        }
        (geometric / arithmetic).clamp(0.0, 1.0)
    }

    /// Most recent computed result
    pub fn last_snapshot(&self) -> SpectralSnapshot {
        self.last
    }

    /// Restore the never-analyzed state, clearing the cache and skip counter
    pub fn reset(&mut self) {
        self.calls = 0;
        self.last = SpectralSnapshot::neutral();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fft::HostSpectrumProvider;
    use crate::error::SpectrumError;

    fn config() -> SpectralConfig {
        SpectralConfig {
            compute_interval: 1,
            ..SpectralConfig::default()
        }
    }

    fn sine(sample_rate: u32, frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    fn noise(len: usize) -> Vec<f32> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_centroid_tracks_tone_frequency() {
        let mut analyzer = SpectralAnalyzer::new(config(), 48_000).unwrap();
        let snapshot = analyzer.analyze(&sine(48_000, 2000.0, 1024));
        assert!(
            (snapshot.centroid - 2000.0).abs() < 200.0,
            "2 kHz tone centroid at {} Hz",
            snapshot.centroid
        );
        assert!((snapshot.brightness - snapshot.centroid / 24_000.0).abs() < 1e-4);
        assert_eq!(snapshot.formant, snapshot.centroid.clamp(500.0, 3000.0));
    }

    #[test]
    fn test_flatness_separates_noise_from_tone() {
        let mut analyzer = SpectralAnalyzer::new(config(), 48_000).unwrap();
        let tone = analyzer.analyze(&sine(48_000, 1000.0, 1024));
        assert!(
            tone.breathiness < 0.3,
            "tone flatness {} should be well below 0.3",
            tone.breathiness
        );

        let noisy = analyzer.analyze(&noise(1024));
        assert!(
            noisy.breathiness > 0.5,
            "noise flatness {} should be near 1",
            noisy.breathiness
        );
        assert!(noisy.breathiness > tone.breathiness);
    }

    #[test]
    fn test_zero_spectrum_yields_neutral_defaults() {
        let mut analyzer = SpectralAnalyzer::new(config(), 48_000).unwrap();
        let snapshot = analyzer.analyze(&vec![0.0; 1024]);
        assert_eq!(snapshot, SpectralSnapshot::neutral());
        assert_eq!(snapshot.breathiness, 0.5);
        assert_eq!(snapshot.formant, 500.0);
    }

    #[test]
    fn test_skipped_calls_replay_last_result() {
        let cfg = SpectralConfig {
            compute_interval: 3,
            ..SpectralConfig::default()
        };
        let mut analyzer = SpectralAnalyzer::new(cfg, 48_000).unwrap();

        let computed = analyzer.analyze(&sine(48_000, 2000.0, 1024));
        // The next two calls see a very different signal but replay the
        // cached snapshot, not zeros
        let skipped_a = analyzer.analyze(&sine(48_000, 200.0, 1024));
        let skipped_b = analyzer.analyze(&vec![0.0; 1024]);
        assert_eq!(skipped_a, computed);
        assert_eq!(skipped_b, computed);

        // Fourth call recomputes
        let recomputed = analyzer.analyze(&sine(48_000, 200.0, 1024));
        assert!(recomputed.centroid < computed.centroid);
    }

    #[test]
    fn test_transform_failure_degrades_to_last_good() {
        let fail_after_first = {
            let mut calls = 0u32;
            Box::new(move |_block: &[f32], out: &mut [f32]| {
                calls += 1;
                if calls == 1 {
                    // A lone mid-band peak at bin 100
                    out.fill(0.0);
                    out[100] = 1.0;
                    Ok(())
                } else {
                    Err(SpectrumError::Unavailable)
                }
            })
        };
        let provider = HostSpectrumProvider::new(1024, fail_after_first).unwrap();
        let mut analyzer =
            SpectralAnalyzer::with_provider(config(), 48_000, Box::new(provider)).unwrap();

        let first = analyzer.analyze(&[0.0; 1024]);
        assert!(first.centroid > 0.0);

        // Failure path returns the previous result unchanged
        let second = analyzer.analyze(&[0.0; 1024]);
        assert_eq!(second, first);
    }

    #[test]
    fn test_transform_failure_before_any_success_is_neutral() {
        let provider = HostSpectrumProvider::new(
            1024,
            Box::new(|_block, _out| Err(SpectrumError::Unavailable)),
        )
        .unwrap();
        let mut analyzer =
            SpectralAnalyzer::with_provider(config(), 48_000, Box::new(provider)).unwrap();
        assert_eq!(analyzer.analyze(&[0.0; 1024]), SpectralSnapshot::neutral());
    }

    #[test]
    fn test_band_restriction_excludes_out_of_band_energy() {
        // Energy only below min_frequency; the band sees nothing
        let cfg = SpectralConfig {
            min_frequency: 1000.0,
            max_frequency: 8000.0,
            compute_interval: 1,
            ..SpectralConfig::default()
        };
        let mut analyzer = SpectralAnalyzer::new(cfg, 48_000).unwrap();
        let snapshot = analyzer.analyze(&sine(48_000, 100.0, 1024));
        // Windowing leaks a little energy upward, but the centroid cannot
        // sit below the band floor
        assert!(snapshot.centroid == 0.0 || snapshot.centroid >= 1000.0);
    }

    #[test]
    fn test_reset_clears_cache_and_counter() {
        let cfg = SpectralConfig {
            compute_interval: 2,
            ..SpectralConfig::default()
        };
        let mut analyzer = SpectralAnalyzer::new(cfg, 48_000).unwrap();
        analyzer.analyze(&sine(48_000, 2000.0, 1024));
        analyzer.reset();
        assert_eq!(analyzer.last_snapshot(), SpectralSnapshot::neutral());

        // First call after reset computes rather than replaying
        let snapshot = analyzer.analyze(&sine(48_000, 500.0, 1024));
        assert!((snapshot.centroid - 500.0).abs() < 200.0);
    }
}
