//! Mixer — sums every connection feeding a node into one input block.

/// Fixed-capacity summing bus.
///
/// Capacity is set once (one render quantum); `clear` never grows the
/// buffer, so mixing inside the render callback does not allocate.
#[derive(Debug, Clone)]
pub struct Mixer {
    buffer: Vec<f32>,
    len: usize,
}

impl Mixer {
    pub fn with_capacity(frames: usize) -> Self {
        Mixer {
            buffer: vec![0.0; frames],
            len: 0,
        }
    }

    /// Zero the first `frames` samples and make them the active block.
    pub fn clear(&mut self, frames: usize) {
        self.len = frames.min(self.buffer.len());
        self.buffer[..self.len].fill(0.0);
    }

    /// Add `source` sample-by-sample into the active block.
    pub fn add(&mut self, source: &[f32]) {
        for (acc, &s) in self.buffer[..self.len].iter_mut().zip(source) {
            *acc += s;
        }
    }

    pub fn output(&self) -> &[f32] {
        &self.buffer[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Hard clip to the `[-1, 1]` range a destination can represent.
pub fn hard_clip(x: f32) -> f32 {
    x.clamp(-1.0, 1.0)
}
