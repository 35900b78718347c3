//! DSP kernels — pure Rust sample processing behind the engine's nodes.
//!
//! Nothing here knows about the graph; each kernel processes plain `f32`
//! slices so the same code runs in the browser worklet and natively.

pub mod analyser;
pub mod filter;
pub mod mixer;
pub mod noise;
pub mod oscillator;
