//! White-noise processor module — the noise source behind the Noise state.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::worklet::{AudioProcessor, ProcessorModule};

/// Name under which the noise processor is registered with the engine.
pub const WHITE_NOISE_PROCESSOR: &str = "white-noise-processor";

/// Registers and instantiates [`WhiteNoiseProcessor`]s.
///
/// Each instance draws from its own generator; seeds are derived from the
/// module seed and an instance counter, so two instances never emit the same
/// sequence but a given module is reproducible.
#[derive(Debug)]
pub struct WhiteNoiseModule {
    seed: u64,
    instances: AtomicU64,
}

impl WhiteNoiseModule {
    pub fn new() -> Self {
        Self::with_seed(fastrand::u64(..))
    }

    pub fn with_seed(seed: u64) -> Self {
        WhiteNoiseModule {
            seed,
            instances: AtomicU64::new(0),
        }
    }

    /// Number of processors created so far.
    pub fn instance_count(&self) -> u64 {
        self.instances.load(Ordering::Relaxed)
    }
}

impl Default for WhiteNoiseModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorModule for WhiteNoiseModule {
    fn name(&self) -> &str {
        WHITE_NOISE_PROCESSOR
    }

    fn instantiate(&self, _sample_rate: f64) -> Box<dyn AudioProcessor> {
        let n = self.instances.fetch_add(1, Ordering::Relaxed);
        let seed = self.seed ^ n.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Box::new(WhiteNoiseProcessor::new(seed))
    }
}

/// Uniform white noise in `[-1, 1)`.
#[derive(Debug, Clone)]
pub struct WhiteNoiseProcessor {
    rng: fastrand::Rng,
}

impl WhiteNoiseProcessor {
    pub fn new(seed: u64) -> Self {
        WhiteNoiseProcessor {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl AudioProcessor for WhiteNoiseProcessor {
    fn process(&mut self, _input: &[f32], output: &mut [f32]) -> bool {
        for sample in output.iter_mut() {
            *sample = self.rng.f32() * 2.0 - 1.0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(processor: &mut dyn AudioProcessor, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        assert!(processor.process(&[], &mut out));
        out
    }

    #[test]
    fn output_is_within_unit_range_and_roughly_centered() {
        let mut p = WhiteNoiseProcessor::new(7);
        let out = render(&mut p, 48000);
        assert!(out.iter().all(|s| (-1.0..1.0).contains(s)));
        let mean = out.iter().map(|&s| s as f64).sum::<f64>() / out.len() as f64;
        assert!(mean.abs() < 0.02, "Mean should be near zero, got {mean}");
    }

    #[test]
    fn rms_matches_uniform_distribution() {
        let mut p = WhiteNoiseProcessor::new(11);
        let out = render(&mut p, 48000);
        let rms = (out.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / out.len() as f64).sqrt();
        // Uniform on [-1, 1) has RMS 1/sqrt(3) ≈ 0.577
        assert!((rms - 0.577).abs() < 0.02, "RMS {rms}");
    }

    #[test]
    fn instances_are_independent() {
        let module = WhiteNoiseModule::with_seed(42);
        let mut a = module.instantiate(44100.0);
        let mut b = module.instantiate(44100.0);
        assert_ne!(render(a.as_mut(), 64), render(b.as_mut(), 64));
        assert_eq!(module.instance_count(), 2);
    }

    #[test]
    fn module_is_reproducible_from_seed() {
        let mut first = WhiteNoiseModule::with_seed(5).instantiate(44100.0);
        let mut second = WhiteNoiseModule::with_seed(5).instantiate(44100.0);
        assert_eq!(render(first.as_mut(), 32), render(second.as_mut(), 32));
    }
}
