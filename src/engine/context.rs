//! Software engine context shared between the control and render threads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use super::graph::{Graph, Playback};
use super::worklet::{ProcessorModule, ProcessorRegistry};
use super::{
    AudioEngine, Autoplay, ContextOptions, ContextState, NodeId, NodeKind, Param, RENDER_QUANTUM,
};
use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::error::EngineError;

struct ContextInner {
    graph: Graph,
    registry: ProcessorRegistry,
    state: ContextState,
    autoplay: Autoplay,
    user_activated: bool,
    frames_rendered: u64,
}

/// Handle to a software-rendered audio context.
///
/// Cloning yields another handle to the same context; hand one to the
/// platform's audio callback and call [`SoftwareContext::render`] from it.
#[derive(Clone)]
pub struct SoftwareContext {
    shared: Arc<Mutex<ContextInner>>,
    sample_rate: f64,
}

impl SoftwareContext {
    /// A context that starts running if autoplay is allowed, suspended otherwise.
    pub fn new(options: ContextOptions) -> Self {
        let state = match options.autoplay {
            Autoplay::Allowed => ContextState::Running,
            Autoplay::RequiresGesture => ContextState::Suspended,
        };
        let inner = ContextInner {
            graph: Graph::new(options.sample_rate),
            registry: ProcessorRegistry::new(),
            state,
            autoplay: options.autoplay,
            user_activated: false,
            frames_rendered: 0,
        };
        SoftwareContext {
            shared: Arc::new(Mutex::new(inner)),
            sample_rate: options.sample_rate,
        }
    }

    // The render callback never leaves the graph half-updated, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, ContextInner> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a user interaction, lifting a gesture-gated autoplay policy.
    pub fn notify_user_gesture(&self) {
        self.lock().user_activated = true;
    }

    /// Seconds of audio rendered while running.
    pub fn current_time(&self) -> f64 {
        self.lock().frames_rendered as f64 / self.sample_rate
    }

    /// Fill an interleaved buffer with `channels` identical channels.
    ///
    /// A suspended context writes silence and does not advance its clock.
    /// Samples of a trailing partial frame are zeroed.
    pub fn render(&self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        out.fill(0.0);
        let mut inner = self.lock();
        if inner.state == ContextState::Suspended {
            return;
        }

        for chunk in out.chunks_mut(RENDER_QUANTUM * channels) {
            let frames = chunk.len() / channels;
            let block = inner.graph.render_block(frames);
            for (frame, &sample) in chunk.chunks_mut(channels).zip(block) {
                frame.fill(sample);
            }
            inner.frames_rendered += frames as u64;
        }
    }

    /// Render a mono block of `frames` samples; convenience for tests and
    /// offline inspection.
    pub fn render_mono(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.render(&mut out, 1);
        out
    }

    pub fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.lock().graph.kind(node)
    }

    /// Live nodes, the destination included.
    pub fn node_count(&self) -> usize {
        self.lock().graph.node_count()
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.lock().graph.is_connected(from, to)
    }

    pub fn outputs_of(&self, node: NodeId) -> Vec<NodeId> {
        self.lock().graph.outputs_of(node)
    }

    pub fn is_playing(&self, node: NodeId) -> bool {
        self.lock().graph.playback(node) == Some(Playback::Playing)
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.lock().registry.contains(name)
    }
}

impl AudioEngine for SoftwareContext {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn state(&self) -> ContextState {
        self.lock().state
    }

    fn destination(&self) -> NodeId {
        self.lock().graph.destination()
    }

    async fn add_module(&self, module: Arc<dyn ProcessorModule>) -> Result<(), EngineError> {
        let name = module.name().to_string();
        self.lock().registry.register(module)?;
        debug!("registered processor module '{name}'");
        Ok(())
    }

    fn create_gain(&self) -> Result<NodeId, EngineError> {
        Ok(self.lock().graph.add_gain())
    }

    fn create_oscillator(&self, waveform: Waveform) -> Result<NodeId, EngineError> {
        Ok(self.lock().graph.add_oscillator(waveform))
    }

    fn create_biquad_filter(&self, filter_type: FilterType) -> Result<NodeId, EngineError> {
        Ok(self.lock().graph.add_biquad(filter_type))
    }

    fn create_analyser(&self, fft_size: usize) -> Result<NodeId, EngineError> {
        self.lock().graph.add_analyser(fft_size)
    }

    fn create_processor(&self, name: &str) -> Result<NodeId, EngineError> {
        let mut inner = self.lock();
        let processor = inner.registry.instantiate(name, self.sample_rate)?;
        Ok(inner.graph.add_processor(processor))
    }

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
        self.lock().graph.connect(from, to)
    }

    fn disconnect(&self, node: NodeId) -> Result<(), EngineError> {
        self.lock().graph.disconnect(node)
    }

    fn release(&self, node: NodeId) -> Result<(), EngineError> {
        self.lock().graph.remove(node)
    }

    fn start(&self, node: NodeId) -> Result<(), EngineError> {
        self.lock().graph.start(node)
    }

    fn stop(&self, node: NodeId) -> Result<(), EngineError> {
        self.lock().graph.stop(node)
    }

    fn set_param(&self, node: NodeId, param: Param, value: f64) -> Result<(), EngineError> {
        self.lock().graph.set_param(node, param, value)
    }

    fn param(&self, node: NodeId, param: Param) -> Result<f64, EngineError> {
        self.lock().graph.param(node, param)
    }

    fn frequency_bin_count(&self, analyser: NodeId) -> Result<usize, EngineError> {
        self.lock().graph.frequency_bin_count(analyser)
    }

    fn byte_frequency_data(&self, analyser: NodeId, out: &mut [u8]) -> Result<(), EngineError> {
        self.lock().graph.byte_frequency_data(analyser, out)
    }

    async fn suspend(&self) -> Result<(), EngineError> {
        self.lock().state = ContextState::Suspended;
        Ok(())
    }

    async fn resume(&self) -> Result<(), EngineError> {
        let mut inner = self.lock();
        if inner.autoplay == Autoplay::RequiresGesture && !inner.user_activated {
            return Err(EngineError::NotAllowed);
        }
        inner.state = ContextState::Running;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::noise::{WHITE_NOISE_PROCESSOR, WhiteNoiseModule};
    use pollster::block_on;

    #[test]
    fn autoplay_allowed_context_starts_running() {
        let ctx = SoftwareContext::new(ContextOptions::default());
        assert_eq!(ctx.state(), ContextState::Running);
        assert_eq!(ctx.node_count(), 1);
    }

    #[test]
    fn gesture_gated_context_refuses_resume_until_activated() {
        let ctx = SoftwareContext::new(ContextOptions {
            autoplay: Autoplay::RequiresGesture,
            ..ContextOptions::default()
        });
        assert_eq!(ctx.state(), ContextState::Suspended);
        assert_eq!(block_on(ctx.resume()), Err(EngineError::NotAllowed));

        ctx.notify_user_gesture();
        block_on(ctx.resume()).unwrap();
        assert_eq!(ctx.state(), ContextState::Running);
    }

    #[test]
    fn suspended_context_renders_silence_and_holds_clock() {
        let ctx = SoftwareContext::new(ContextOptions::default());
        let osc = ctx.create_oscillator(Waveform::Sine).unwrap();
        ctx.connect(osc, ctx.destination()).unwrap();
        ctx.start(osc).unwrap();

        assert!(ctx.render_mono(256).iter().any(|&s| s != 0.0));
        let t = ctx.current_time();

        block_on(ctx.suspend()).unwrap();
        assert!(ctx.render_mono(256).iter().all(|&s| s == 0.0));
        assert_eq!(ctx.current_time(), t);
    }

    #[test]
    fn render_duplicates_mono_into_every_channel() {
        let ctx = SoftwareContext::new(ContextOptions::default());
        let osc = ctx.create_oscillator(Waveform::Sawtooth).unwrap();
        ctx.connect(osc, ctx.destination()).unwrap();
        ctx.start(osc).unwrap();

        // Not a multiple of the render quantum on purpose.
        let mut out = vec![0.0f32; 2 * 300];
        ctx.render(&mut out, 2);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!((ctx.current_time() - 300.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn trailing_partial_frame_is_zeroed() {
        let ctx = SoftwareContext::new(ContextOptions::default());
        let osc = ctx.create_oscillator(Waveform::Square).unwrap();
        ctx.connect(osc, ctx.destination()).unwrap();
        ctx.start(osc).unwrap();

        let mut out = [9.0f32; 3];
        ctx.render(&mut out, 2);
        assert_eq!(out[0], out[1]);
        assert_ne!(out[0], 9.0);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn processors_are_instantiated_from_registered_modules() {
        let ctx = SoftwareContext::new(ContextOptions::default());
        assert!(matches!(
            ctx.create_processor(WHITE_NOISE_PROCESSOR),
            Err(EngineError::UnknownProcessor(_))
        ));

        block_on(ctx.add_module(Arc::new(WhiteNoiseModule::with_seed(1)))).unwrap();
        assert!(ctx.has_module(WHITE_NOISE_PROCESSOR));

        let noise = ctx.create_processor(WHITE_NOISE_PROCESSOR).unwrap();
        assert_eq!(ctx.node_kind(noise), Some(NodeKind::Processor));
        ctx.connect(noise, ctx.destination()).unwrap();
        assert!(ctx.render_mono(128).iter().any(|&s| s != 0.0));
    }

    #[test]
    fn handles_share_one_graph() {
        let ctx = SoftwareContext::new(ContextOptions::default());
        let render_side = ctx.clone();
        let gain = ctx.create_gain().unwrap();
        assert_eq!(render_side.node_kind(gain), Some(NodeKind::Gain));
    }
}
