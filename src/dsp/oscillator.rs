//! Periodic-waveform generator for the tone source.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Waveform shapes an oscillator node can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Phase-accumulating oscillator with PolyBLEP correction on the
/// discontinuous shapes.
///
/// Frequency changes only alter the phase increment, never the phase, so a
/// retune while running is click-free.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            phase: 0.0,
            sample_rate,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Set the frequency, clamped to `[-nyquist, nyquist]`.
    pub fn set_frequency(&mut self, hz: f64) {
        let nyquist = self.sample_rate / 2.0;
        self.frequency = hz.clamp(-nyquist, nyquist);
    }

    /// Render `out.len()` samples.
    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample() as f32;
        }
    }

    pub fn next_sample(&mut self) -> f64 {
        let inc = self.frequency / self.sample_rate;
        let dt = inc.abs();
        let value = match self.waveform {
            Waveform::Sine => (TAU * self.phase).sin(),
            Waveform::Sawtooth => 2.0 * self.phase - 1.0 - poly_blep(self.phase, dt),
            Waveform::Square => {
                let naive = if self.phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(self.phase, dt) - poly_blep((self.phase + 0.5) % 1.0, dt)
            }
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };

        self.phase = (self.phase + inc).rem_euclid(1.0);
        value
    }
}

/// Polynomial band-limited step residual at phase `t` for increment `dt`.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}
