//! Biquad filter — RBJ cookbook coefficients, notch edge cases as in
//! Web Audio's BiquadFilterNode.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Filter response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    #[default]
    Notch,
}

/// A second-order IIR section in Direct Form II Transposed.
///
/// `frequency` and `q` are applied lazily: setters only mark the
/// coefficients dirty, and the next `process_block` recomputes them once.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: FilterType,
    frequency: f64,
    q: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,

    sample_rate: f64,
    dirty: bool,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency: 350.0,
            q: 1.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
            dirty: true,
        };
        f.update_coefficients();
        f
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn set_frequency(&mut self, hz: f64) {
        if hz != self.frequency {
            self.frequency = hz;
            self.dirty = true;
        }
    }

    pub fn set_q(&mut self, q: f64) {
        if q != self.q {
            self.q = q;
            self.dirty = true;
        }
    }

    /// Recompute coefficients from the current frequency and Q.
    pub fn update_coefficients(&mut self) {
        self.dirty = false;

        let nyquist = self.sample_rate / 2.0;
        let normalized = (self.frequency / nyquist).clamp(0.0, 1.0);

        // At DC or Nyquist every response here degenerates to a wire,
        // except lowpass at DC which blocks everything.
        if normalized <= 0.0 || normalized >= 1.0 {
            let gain = match (self.filter_type, normalized <= 0.0) {
                (FilterType::Lowpass, true) | (FilterType::Highpass, false) => 0.0,
                (FilterType::Bandpass, _) => 0.0,
                _ => 1.0,
            };
            self.set_normalized(gain, 0.0, 0.0, 1.0, 0.0, 0.0);
            return;
        }

        if self.q <= 0.0 {
            // Limit of the z-transform as Q -> 0.
            let gain = match self.filter_type {
                FilterType::Notch => 0.0,
                FilterType::Bandpass => 1.0,
                FilterType::Lowpass | FilterType::Highpass => 0.5,
            };
            self.set_normalized(gain, 0.0, 0.0, 1.0, 0.0, 0.0);
            return;
        }

        let w0 = PI * normalized;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * self.q);

        let (b0, b1, b2) = match self.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha),
            FilterType::Notch => (1.0, -2.0 * cos_w0, 1.0),
        };
        self.set_normalized(b0, b1, b2, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha);
    }

    fn set_normalized(&mut self, b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) {
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Filter `input` into `output` (equal lengths).
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        if self.dirty {
            self.update_coefficients();
        }
        for (out, &x) in output.iter_mut().zip(input) {
            *out = self.process(x as f64) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    /// Peak output amplitude for a sine at `freq` after the transient settles.
    fn steady_state_peak(filter: &mut BiquadFilter, freq: f64) -> f64 {
        let input: Vec<f32> = (0..SR as usize)
            .map(|i| (2.0 * PI * freq * i as f64 / SR).sin() as f32)
            .collect();
        let mut output = vec![0.0f32; input.len()];
        filter.process_block(&input, &mut output);
        output[input.len() / 2..]
            .iter()
            .fold(0.0f64, |m, &s| m.max(s.abs() as f64))
    }

    #[test]
    fn notch_rejects_center_frequency() {
        let mut f = BiquadFilter::new(FilterType::Notch, SR);
        f.set_frequency(3000.0);
        f.set_q(1.0);
        let peak = steady_state_peak(&mut f, 3000.0);
        assert!(peak < 0.01, "Notch@3kHz should null 3kHz, got {peak}");
    }

    #[test]
    fn notch_passes_distant_frequency() {
        let mut f = BiquadFilter::new(FilterType::Notch, SR);
        f.set_frequency(3000.0);
        f.set_q(5.0);
        let peak = steady_state_peak(&mut f, 200.0);
        assert!(peak > 0.95, "Notch@3kHz should pass 200Hz, got {peak}");
    }

    #[test]
    fn notch_with_zero_q_is_silent() {
        let mut f = BiquadFilter::new(FilterType::Notch, SR);
        f.set_frequency(1000.0);
        f.set_q(0.0);
        assert_eq!(steady_state_peak(&mut f, 200.0), 0.0);
    }

    #[test]
    fn frequency_at_nyquist_is_passthrough_for_notch() {
        let mut f = BiquadFilter::new(FilterType::Notch, SR);
        f.set_frequency(SR);
        let peak = steady_state_peak(&mut f, 1000.0);
        assert!((peak - 1.0).abs() < 1e-3);
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, SR);
        f.set_frequency(5000.0);
        f.update_coefficients();
        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.001, "Lowpass should pass DC, got {output}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = BiquadFilter::new(FilterType::Highpass, SR);
        f.set_frequency(1000.0);
        f.update_coefficients();
        let mut output = 1.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!(output.abs() < 0.001, "Highpass should block DC, got {output}");
    }

    #[test]
    fn bandpass_output_stays_finite() {
        let mut f = BiquadFilter::new(FilterType::Bandpass, SR);
        f.set_frequency(1000.0);
        f.update_coefficients();
        for i in 0..10000 {
            let input = if i % 100 == 0 { 1.0 } else { 0.0 };
            assert!(f.process(input).is_finite(), "Not finite at sample {i}");
        }
    }
}
