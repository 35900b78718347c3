//! Spectrum analyser with Web Audio `AnalyserNode` semantics.
//!
//! The render thread feeds every block through [`SpectrumAnalyser::capture`];
//! the UI thread asks for [`SpectrumAnalyser::byte_frequency_data`] at display
//! rate. Readback applies a Blackman window to the most recent `fft_size`
//! samples, smooths magnitudes over time, converts to decibels and maps the
//! `[min_decibels, max_decibels]` range onto `0..=255`.
//!
//! All buffers (including the FFT scratch) are allocated up front; neither
//! capture nor readback allocates.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

pub struct SpectrumAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

impl SpectrumAnalyser {
    /// `fft_size` must be a power of two in `32..=32768`.
    pub fn new(fft_size: usize) -> Result<Self, String> {
        if !fft_size.is_power_of_two() || !(32..=32768).contains(&fft_size) {
            return Err(format!(
                "FFT size must be a power of two between 32 and 32768, got {fft_size}"
            ));
        }

        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(SpectrumAnalyser {
            fft_size,
            fft,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            window: blackman_window(fft_size),
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            smoothed: vec![0.0; fft_size / 2],
            smoothing: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins: half the FFT size.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append a rendered block to the time-domain history.
    pub fn capture(&mut self, block: &[f32]) {
        for &s in block {
            self.ring[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Write one byte per bin into `out` (up to `frequency_bin_count()`).
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.analyse();

        let range = self.max_decibels - self.min_decibels;
        for (byte, &mag) in out.iter_mut().zip(&self.smoothed) {
            let db = 20.0 * mag.log10();
            let scaled = 255.0 * (db - self.min_decibels) / range;
            // NaN/-inf from silent bins fall through to 0.
            *byte = if scaled.is_finite() {
                scaled.clamp(0.0, 255.0) as u8
            } else if scaled == f32::INFINITY {
                255
            } else {
                0
            };
        }
    }

    fn analyse(&mut self) {
        // Oldest sample first: the ring's write position is the oldest.
        for i in 0..self.fft_size {
            let s = self.ring[(self.write_pos + i) % self.fft_size];
            self.spectrum[i] = Complex::new(s * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let tau = self.smoothing.clamp(0.0, 1.0);
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let mag = bin.norm() * norm;
            let next = tau * *smoothed + (1.0 - tau) * mag;
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }
    }
}

/// Blackman window with alpha = 0.16.
fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}
