//! Audio signal controller — owns the live graph and the playback state
//! machine.
//!
//! ```text
//!   Tone:   oscillator ───────────────┐
//!                                     ├──► gain ──► analyser ──► destination
//!   Noise:  noise processor ─► notch ─┘
//! ```
//!
//! The gain and analyser stages are built once by [`initialize`] and live as
//! long as the controller. Sources are rebuilt on every [`set_state`]:
//! whatever is playing is torn down and the engine suspended before the
//! target state's nodes are created, including when the target equals the
//! current state.
//!
//! [`initialize`]: AudioSignalController::initialize
//! [`set_state`]: AudioSignalController::set_state

use std::sync::Arc;

use log::{debug, info, warn};

use crate::dsp::filter::FilterType;
use crate::dsp::noise::WhiteNoiseModule;
use crate::dsp::oscillator::Waveform;
use crate::engine::{AudioEngine, ContextOptions, NodeId, Param, ProcessorModule, SoftwareContext};
use crate::error::{EngineError, ToneError};
use crate::params::{AudioParameters, PlaybackState};

/// Analysis window of the persistent analyser; the spectrum has half as many bins.
pub const ANALYSER_FFT_SIZE: usize = 256;

/// The source nodes of a non-idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSource {
    Oscillator(NodeId),
    Noise { processor: NodeId, filter: NodeId },
}

#[derive(Debug, Clone, Copy)]
struct OutputChain {
    gain: NodeId,
    analyser: NodeId,
}

pub struct AudioSignalController<E: AudioEngine> {
    engine: E,
    noise_module: Arc<dyn ProcessorModule>,
    module_loaded: bool,
    params: AudioParameters,
    state: PlaybackState,
    chain: Option<OutputChain>,
    source: Option<ActiveSource>,
    spectrum: Vec<u8>,
}

/// Controller over the in-crate software engine.
pub type ToneGenerator = AudioSignalController<SoftwareContext>;

impl AudioSignalController<SoftwareContext> {
    /// Create a controller with its own software context.
    pub fn new(params: AudioParameters) -> Self {
        Self::with_engine(SoftwareContext::new(ContextOptions::default()), params)
    }
}

impl<E: AudioEngine> AudioSignalController<E> {
    /// Take ownership of `engine` and remember `params`. No nodes exist until
    /// [`initialize`](Self::initialize) completes.
    pub fn with_engine(engine: E, params: AudioParameters) -> Self {
        AudioSignalController {
            engine,
            noise_module: Arc::new(WhiteNoiseModule::new()),
            module_loaded: false,
            params,
            state: PlaybackState::Idle,
            chain: None,
            source: None,
            spectrum: Vec::new(),
        }
    }

    /// Replace the noise source module. Its name is what the Noise state
    /// instantiates. Only meaningful before `initialize()`.
    pub fn with_noise_module(mut self, module: Arc<dyn ProcessorModule>) -> Self {
        self.noise_module = module;
        self
    }

    /// Register the noise module and build the persistent gain → analyser →
    /// destination chain.
    ///
    /// Each step runs at most once per controller, so calling this again
    /// after a failure resumes where the last attempt stopped, and calling it
    /// after success does nothing.
    pub async fn initialize(&mut self) -> Result<(), ToneError> {
        if !self.module_loaded {
            self.engine
                .add_module(Arc::clone(&self.noise_module))
                .await
                .inspect_err(|e| warn!("noise module failed to load: {e}"))?;
            self.module_loaded = true;
        }

        if self.chain.is_none() {
            let (chain, bins) = self.build_output_chain()?;
            self.spectrum = vec![0; bins];
            self.chain = Some(chain);
            info!(
                "audio controller initialized at {} Hz ({bins} spectrum bins)",
                self.engine.sample_rate()
            );
        }
        Ok(())
    }

    fn build_output_chain(&self) -> Result<(OutputChain, usize), EngineError> {
        let analyser = self.engine.create_analyser(ANALYSER_FFT_SIZE)?;
        let gain = match self.engine.create_gain() {
            Ok(gain) => gain,
            Err(e) => {
                let _ = self.engine.release(analyser);
                return Err(e);
            }
        };

        let wired = self
            .engine
            .connect(analyser, self.engine.destination())
            .and_then(|_| self.engine.connect(gain, analyser))
            .and_then(|_| self.engine.set_param(gain, Param::Gain, self.params.volume))
            .and_then(|_| self.engine.frequency_bin_count(analyser));

        match wired {
            Ok(bins) => Ok((OutputChain { gain, analyser }, bins)),
            Err(e) => {
                let _ = self.engine.release(gain);
                let _ = self.engine.release(analyser);
                Err(e)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.module_loaded && self.chain.is_some()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn params(&self) -> AudioParameters {
        self.params
    }

    pub fn active_source(&self) -> Option<ActiveSource> {
        self.source
    }

    pub fn oscillator(&self) -> Option<NodeId> {
        match self.source {
            Some(ActiveSource::Oscillator(osc)) => Some(osc),
            _ => None,
        }
    }

    pub fn filter(&self) -> Option<NodeId> {
        match self.source {
            Some(ActiveSource::Noise { filter, .. }) => Some(filter),
            _ => None,
        }
    }

    pub fn noise_processor(&self) -> Option<NodeId> {
        match self.source {
            Some(ActiveSource::Noise { processor, .. }) => Some(processor),
            _ => None,
        }
    }

    pub fn gain_node(&self) -> Option<NodeId> {
        self.chain.map(|c| c.gain)
    }

    pub fn analyser_node(&self) -> Option<NodeId> {
        self.chain.map(|c| c.analyser)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn set_volume(&mut self, volume: f64) -> Result<(), ToneError> {
        self.params.volume = volume;
        if let Some(chain) = self.chain {
            self.engine.set_param(chain.gain, Param::Gain, volume)?;
        }
        Ok(())
    }

    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), ToneError> {
        self.params.frequency = frequency;
        match self.source {
            Some(ActiveSource::Oscillator(osc)) => {
                self.engine.set_param(osc, Param::Frequency, frequency)?
            }
            Some(ActiveSource::Noise { filter, .. }) => {
                self.engine.set_param(filter, Param::Frequency, frequency)?
            }
            None => {}
        }
        Ok(())
    }

    pub fn set_q_factor(&mut self, q_factor: f64) -> Result<(), ToneError> {
        self.params.q_factor = q_factor;
        if let Some(filter) = self.filter() {
            self.engine.set_param(filter, Param::Q, q_factor)?;
        }
        Ok(())
    }

    /// Tear down the current source, suspend, build `next`, and resume if
    /// `next` is audible.
    ///
    /// On error the controller is left in `Idle` with no source nodes and the
    /// engine suspended; the caller may retry (for example after a user
    /// gesture when the platform refused to resume).
    pub async fn set_state(&mut self, next: PlaybackState) -> Result<(), ToneError> {
        let gain = self.chain.map(|c| c.gain).ok_or(ToneError::NotInitialized)?;
        let previous = self.state;

        let released = self.release_source();
        self.state = PlaybackState::Idle;
        let suspended = self.engine.suspend().await;
        if let Err(e) = released.and(suspended) {
            warn!("teardown before {next} failed: {e}");
            return Err(e.into());
        }

        if let Err(e) = self.build_source(next, gain) {
            warn!("failed to build {next} graph: {e}");
            let _ = self.release_source();
            return Err(e.into());
        }

        if next != PlaybackState::Idle {
            if let Err(e) = self.engine.resume().await {
                warn!("engine refused to resume for {next}: {e}");
                let _ = self.release_source();
                return Err(e.into());
            }
        }

        self.state = next;
        debug!("playback {previous} -> {next}");
        Ok(())
    }

    /// Stop, disconnect and release the current source nodes.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned.
    fn release_source(&mut self) -> Result<(), EngineError> {
        let Some(source) = self.source.take() else {
            return Ok(());
        };

        let steps = match source {
            ActiveSource::Oscillator(osc) => vec![
                self.engine.stop(osc),
                self.engine.disconnect(osc),
                self.engine.release(osc),
            ],
            ActiveSource::Noise { processor, filter } => vec![
                self.engine.disconnect(processor),
                self.engine.disconnect(filter),
                self.engine.release(processor),
                self.engine.release(filter),
            ],
        };
        debug!("released {source:?}");
        steps.into_iter().collect()
    }

    /// Create and wire the source nodes for `next`. The source is recorded as
    /// soon as its nodes exist so a failure part-way can still release them.
    fn build_source(&mut self, next: PlaybackState, gain: NodeId) -> Result<(), EngineError> {
        match next {
            PlaybackState::Idle => Ok(()),
            PlaybackState::Tone => {
                let osc = self.engine.create_oscillator(Waveform::Sine)?;
                self.source = Some(ActiveSource::Oscillator(osc));

                self.engine.connect(osc, gain)?;
                self.engine
                    .set_param(osc, Param::Frequency, self.params.frequency)?;
                self.engine.start(osc)
            }
            PlaybackState::Noise => {
                let filter = self.engine.create_biquad_filter(FilterType::Notch)?;
                let processor = match self.engine.create_processor(self.noise_module.name()) {
                    Ok(processor) => processor,
                    Err(e) => {
                        let _ = self.engine.release(filter);
                        return Err(e);
                    }
                };
                self.source = Some(ActiveSource::Noise { processor, filter });

                self.engine
                    .set_param(filter, Param::Frequency, self.params.frequency)?;
                self.engine.set_param(filter, Param::Q, self.params.q_factor)?;
                self.engine.connect(processor, filter)?;
                self.engine.connect(filter, gain)
            }
        }
    }

    /// Current spectrum, one byte per bin.
    ///
    /// The returned slice is the controller's own buffer, allocated once at
    /// initialization and overwritten on every call.
    pub fn spectrum_sample(&mut self) -> Result<&[u8], ToneError> {
        let analyser = self
            .chain
            .map(|c| c.analyser)
            .ok_or(ToneError::NotInitialized)?;
        self.engine
            .byte_frequency_data(analyser, &mut self.spectrum)?;
        Ok(&self.spectrum)
    }
}

impl<E: AudioEngine> std::fmt::Debug for AudioSignalController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSignalController")
            .field("noise_module", &self.noise_module.name())
            .field("params", &self.params)
            .field("state", &self.state)
            .field("source", &self.source)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
