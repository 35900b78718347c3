//! Audio engine — the real-time context the signal controller drives.
//!
//! [`AudioEngine`] is the seam between the controller and whatever renders
//! audio. Nodes are addressed by [`NodeId`] handles; all methods take
//! `&self` because an engine context is a shared handle whose graph is also
//! touched by the rendering thread. [`SoftwareContext`] is the in-crate
//! implementation: a block-based graph renderer that a platform sink (an
//! AudioWorklet in the browser, a cpal stream natively) pulls from.

pub mod context;
pub mod graph;
pub mod param;
pub mod worklet;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::error::EngineError;

pub use context::SoftwareContext;
pub use worklet::{AudioProcessor, ProcessorModule};

/// Frames processed per graph pass.
pub const RENDER_QUANTUM: usize = 128;

pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Handle to a node inside an engine context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Automatable parameters exposed by engine nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Param {
    Gain,
    Frequency,
    Q,
}

/// What a node is, for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Destination,
    Gain,
    Oscillator(Waveform),
    BiquadFilter(FilterType),
    Analyser,
    Processor,
}

/// Processing state of the whole context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    #[default]
    Suspended,
    Running,
}

/// Whether the platform lets audio start without a user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Autoplay {
    #[default]
    Allowed,
    RequiresGesture,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    pub sample_rate: f64,
    pub autoplay: Autoplay,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            sample_rate: DEFAULT_SAMPLE_RATE,
            autoplay: Autoplay::Allowed,
        }
    }
}

/// The real-time audio engine a signal controller drives.
///
/// `add_module`, `suspend` and `resume` are the asynchronous operations of
/// the platform (module compilation, device start/stop); everything else is
/// a synchronous command against the node graph.
#[allow(async_fn_in_trait)]
pub trait AudioEngine {
    fn sample_rate(&self) -> f64;
    fn state(&self) -> ContextState;
    /// The sink every audible chain ends in.
    fn destination(&self) -> NodeId;

    /// Load and register a processor module so it can be instantiated by name.
    async fn add_module(&self, module: Arc<dyn ProcessorModule>) -> Result<(), EngineError>;

    fn create_gain(&self) -> Result<NodeId, EngineError>;
    fn create_oscillator(&self, waveform: Waveform) -> Result<NodeId, EngineError>;
    fn create_biquad_filter(&self, filter_type: FilterType) -> Result<NodeId, EngineError>;
    fn create_analyser(&self, fft_size: usize) -> Result<NodeId, EngineError>;
    /// Instantiate a processor from a previously registered module.
    fn create_processor(&self, name: &str) -> Result<NodeId, EngineError>;

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), EngineError>;
    /// Remove every outgoing connection of `node`.
    fn disconnect(&self, node: NodeId) -> Result<(), EngineError>;
    /// Drop the node and any connection still touching it.
    fn release(&self, node: NodeId) -> Result<(), EngineError>;

    fn start(&self, node: NodeId) -> Result<(), EngineError>;
    /// Hard stop; a stopped source cannot be restarted.
    fn stop(&self, node: NodeId) -> Result<(), EngineError>;

    fn set_param(&self, node: NodeId, param: Param, value: f64) -> Result<(), EngineError>;
    fn param(&self, node: NodeId, param: Param) -> Result<f64, EngineError>;

    fn frequency_bin_count(&self, analyser: NodeId) -> Result<usize, EngineError>;
    fn byte_frequency_data(&self, analyser: NodeId, out: &mut [u8]) -> Result<(), EngineError>;

    async fn suspend(&self) -> Result<(), EngineError>;
    async fn resume(&self) -> Result<(), EngineError>;
}
