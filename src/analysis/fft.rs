// FFT module - magnitude-spectrum acquisition
//
// The spectral extractor does not care where its magnitude spectrum comes
// from; it depends on the SpectrumProvider trait. Two implementations:
// FftSpectrumProvider computes the spectrum internally with rustfft, and
// HostSpectrumProvider delegates to a host-native transform supplied as a
// closure. Callers pick one at construction; there is no runtime
// environment sniffing.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{ConfigError, SpectrumError};

/// Source of magnitude spectra for spectral feature extraction
pub trait SpectrumProvider {
    /// Transform size in samples
    fn fft_size(&self) -> usize;

    /// Number of magnitude bins produced (`fft_size / 2 + 1`)
    fn bins(&self) -> usize {
        self.fft_size() / 2 + 1
    }

    /// Magnitude spectrum of the block's first `fft_size` samples
    ///
    /// Shorter blocks are zero-padded. The returned slice stays valid until
    /// the next call on the same provider.
    fn magnitude_spectrum(&mut self, block: &[f32]) -> Result<&[f32], SpectrumError>;
}

/// Internal transform on rustfft with a precomputed Hann window
pub struct FftSpectrumProvider {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    // Reused per call; no steady-state allocation
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl FftSpectrumProvider {
    pub fn new(fft_size: usize) -> Result<Self, ConfigError> {
        if fft_size < 32 || !fft_size.is_power_of_two() {
            return Err(ConfigError::FftSize { got: fft_size });
        }

        // Hann window reduces spectral leakage
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft,
            fft_size,
            window,
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            magnitudes: vec![0.0; fft_size / 2 + 1],
        })
    }
}

impl SpectrumProvider for FftSpectrumProvider {
    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn magnitude_spectrum(&mut self, block: &[f32]) -> Result<&[f32], SpectrumError> {
        if block.len() < 2 {
            return Err(SpectrumError::BlockTooShort {
                got: block.len(),
                needed: 2,
            });
        }

        let used = block.len().min(self.fft_size);
        for i in 0..used {
            self.scratch[i] = Complex::new(block[i] * self.window[i], 0.0);
        }
        for slot in self.scratch.iter_mut().skip(used) {
            *slot = Complex::new(0.0, 0.0);
        }

        self.fft.process(&mut self.scratch);

        // Positive frequencies only, exploiting real-input symmetry
        for (mag, c) in self
            .magnitudes
            .iter_mut()
            .zip(self.scratch[..self.fft_size / 2 + 1].iter())
        {
            *mag = c.norm();
        }
        Ok(&self.magnitudes)
    }
}

/// Callback signature for a host-native transform
///
/// The callback receives the sample block and must fill `out` (length
/// `fft_size / 2 + 1`) with magnitude bins, or report why it could not.
pub type HostTransform = Box<dyn FnMut(&[f32], &mut [f32]) -> Result<(), SpectrumError> + Send>;

/// Host-supplied transform wrapped as a SpectrumProvider
pub struct HostSpectrumProvider {
    transform: HostTransform,
    fft_size: usize,
    magnitudes: Vec<f32>,
}

impl HostSpectrumProvider {
    pub fn new(fft_size: usize, transform: HostTransform) -> Result<Self, ConfigError> {
        if fft_size < 32 || !fft_size.is_power_of_two() {
            return Err(ConfigError::FftSize { got: fft_size });
        }
        Ok(Self {
            transform,
            fft_size,
            magnitudes: vec![0.0; fft_size / 2 + 1],
        })
    }
}

impl SpectrumProvider for HostSpectrumProvider {
    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn magnitude_spectrum(&mut self, block: &[f32]) -> Result<&[f32], SpectrumError> {
        (self.transform)(block, &mut self.magnitudes)?;
        Ok(&self.magnitudes)
    }
}
