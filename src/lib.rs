pub mod controller;
pub mod display;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod params;
pub mod prefs;

pub use controller::{ActiveSource, AudioSignalController, ToneGenerator};
pub use engine::{AudioEngine, ContextOptions, SoftwareContext};
pub use error::{EngineError, ToneError};
pub use params::{AudioParameters, PlaybackState};

use crate::engine::Autoplay;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the tonefinder-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// WASM-exposed tone/noise generator.
///
/// The page owns an AudioWorklet that calls [`process`](Self::process) for
/// every output block; everything else is driven by UI events. The software
/// context finishes its async work synchronously, so `pollster` can drive
/// it without a JS executor.
#[wasm_bindgen(js_name = ToneGenerator)]
pub struct WasmToneGenerator {
    controller: ToneGenerator,
}

#[wasm_bindgen(js_class = ToneGenerator)]
impl WasmToneGenerator {
    /// `params` is `{ volume, frequency, qFactor? }` or `undefined` for the
    /// defaults. Playback stays suspended until `notifyUserGesture()`.
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, params: JsValue) -> Result<WasmToneGenerator, JsValue> {
        let params = if params.is_undefined() || params.is_null() {
            AudioParameters::default()
        } else {
            serde_wasm_bindgen::from_value(params).map_err(js_error)?
        };
        let engine = SoftwareContext::new(ContextOptions {
            sample_rate,
            autoplay: Autoplay::RequiresGesture,
        });
        Ok(WasmToneGenerator {
            controller: AudioSignalController::with_engine(engine, params),
        })
    }

    pub fn initialize(&mut self) -> Result<(), JsValue> {
        pollster::block_on(self.controller.initialize()).map_err(js_error)
    }

    #[wasm_bindgen(js_name = notifyUserGesture)]
    pub fn notify_user_gesture(&self) {
        self.controller.engine().notify_user_gesture();
    }

    /// Volume in gain units (slider value / 1000).
    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&mut self, volume: f64) -> Result<(), JsValue> {
        self.controller.set_volume(volume).map_err(js_error)
    }

    #[wasm_bindgen(js_name = setFrequency)]
    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), JsValue> {
        self.controller.set_frequency(frequency).map_err(js_error)
    }

    #[wasm_bindgen(js_name = setQFactor)]
    pub fn set_q_factor(&mut self, q_factor: f64) -> Result<(), JsValue> {
        self.controller.set_q_factor(q_factor).map_err(js_error)
    }

    /// `"idle"`, `"sound"` or `"noise"`.
    #[wasm_bindgen(js_name = setState)]
    pub fn set_state(&mut self, state: &str) -> Result<(), JsValue> {
        let next: PlaybackState = state.parse().map_err(js_error)?;
        pollster::block_on(self.controller.set_state(next)).map_err(js_error)
    }

    pub fn state(&self) -> String {
        self.controller.state().to_string()
    }

    pub fn params(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.controller.params()).map_err(js_error)
    }

    /// Fill one mono output block.
    pub fn process(&self, out: &mut [f32]) {
        self.controller.engine().render(out, 1);
    }

    /// Current byte spectrum (128 bins).
    pub fn spectrum(&mut self) -> Result<Vec<u8>, JsValue> {
        self.controller
            .spectrum_sample()
            .map(<[u8]>::to_vec)
            .map_err(js_error)
    }
}

/// WASM-exposed: map a pad position to `[frequency, volume]` in UI units.
#[wasm_bindgen(js_name = pointerToControls)]
pub fn pointer_to_controls(x: f64, y: f64, width: f64, height: f64) -> Vec<f64> {
    let (frequency, volume) = display::pointer_to_controls(x, y, width, height);
    vec![frequency, volume]
}

/// WASM-exposed: lay out spectrum bars as `[{x, y, width, height}, ...]`.
#[wasm_bindgen(js_name = spectrumBars)]
pub fn spectrum_bars(data: &[u8], width: f64, height: f64) -> Result<JsValue, JsValue> {
    let bars: Vec<_> = display::spectrum_bars(data, width, height).collect();
    serde_wasm_bindgen::to_value(&bars).map_err(js_error)
}
