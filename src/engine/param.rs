//! Smoothed node parameters.

use super::Param;
use crate::error::EngineError;

/// Time constant of the one-pole smoother used for a-rate parameters.
const SMOOTHING_SECONDS: f64 = 0.005;

/// A node parameter: the value last written plus the value the render
/// thread is currently using.
///
/// `value()` always reports the value last written, so a setter is
/// observable immediately even though the audible value glides toward it.
/// Before the first render pass a write lands directly, so a freshly created
/// node never ramps from its default.
#[derive(Debug, Clone)]
pub struct AudioParam {
    kind: Param,
    value: f64,
    current: f64,
    min: f64,
    max: f64,
    coeff: f64,
    primed: bool,
}

impl AudioParam {
    pub fn new(kind: Param, default: f64, min: f64, max: f64, sample_rate: f64) -> Self {
        AudioParam {
            kind,
            value: default,
            current: default,
            min,
            max,
            coeff: (-1.0 / (SMOOTHING_SECONDS * sample_rate)).exp(),
            primed: false,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Store a new target. Non-finite values are rejected; finite values are
    /// stored as given and clamped to the nominal range when rendered.
    pub fn set_value(&mut self, value: f64) -> Result<(), EngineError> {
        if !value.is_finite() {
            return Err(EngineError::InvalidParam {
                param: self.kind,
                value,
            });
        }
        self.value = value;
        if !self.primed {
            self.current = value;
        }
        Ok(())
    }

    /// Next per-frame value, gliding toward the target.
    pub fn next_smoothed(&mut self) -> f64 {
        self.primed = true;
        let target = self.target();
        self.current = target + (self.current - target) * self.coeff;
        if (self.current - target).abs() < 1e-9 {
            self.current = target;
        }
        self.current
    }

    /// Per-block value with no smoothing.
    pub fn block_value(&mut self) -> f64 {
        self.primed = true;
        self.current = self.target();
        self.current
    }

    fn target(&self) -> f64 {
        self.value.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain() -> AudioParam {
        AudioParam::new(Param::Gain, 1.0, f64::MIN, f64::MAX, 44100.0)
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut p = gain();
        assert!(matches!(
            p.set_value(f64::NAN),
            Err(EngineError::InvalidParam { param: Param::Gain, .. })
        ));
        assert!(p.set_value(f64::INFINITY).is_err());
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn first_write_before_render_does_not_ramp() {
        let mut p = gain();
        p.set_value(0.01).unwrap();
        assert_eq!(p.next_smoothed(), 0.01);
    }

    #[test]
    fn later_writes_glide_to_target() {
        let mut p = gain();
        p.next_smoothed();
        p.set_value(0.0).unwrap();
        assert_eq!(p.value(), 0.0);

        let first = p.next_smoothed();
        assert!(first > 0.9 && first < 1.0, "Should move gradually, got {first}");

        for _ in 0..44100 {
            p.next_smoothed();
        }
        assert_eq!(p.next_smoothed(), 0.0);
    }

    #[test]
    fn render_value_is_clamped_but_stored_value_is_not() {
        let mut p = AudioParam::new(Param::Frequency, 440.0, -22050.0, 22050.0, 44100.0);
        p.set_value(30000.0).unwrap();
        assert_eq!(p.value(), 30000.0);
        assert_eq!(p.block_value(), 22050.0);
    }
}
