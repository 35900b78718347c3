//! Playback state and the user-facing audio parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ToneError;

/// Upper bound of the frequency control, in Hz.
pub const MAX_FREQUENCY: f64 = 22000.0;
/// Upper bound of the volume slider, in slider units.
pub const MAX_VOLUME: f64 = 100.0;
/// Upper bound of the Q slider.
pub const MAX_Q_FACTOR: f64 = 5.0;
/// Slider units per unit of gain.
pub const VOLUME_SCALE: f64 = 1000.0;

pub const DEFAULT_FREQUENCY: f64 = 3000.0;
/// Default volume in slider units.
pub const DEFAULT_VOLUME: f64 = 10.0;
/// Neutral resonance.
pub const DEFAULT_Q_FACTOR: f64 = 1.0;

/// What the generator is currently producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "sound", alias = "tone")]
    Tone,
    #[serde(rename = "noise")]
    Noise,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Tone => "sound",
            PlaybackState::Noise => "noise",
        }
    }

    /// Toggle used by the play/stop buttons: pressing the button for the
    /// active state stops it, any other press switches to `target`.
    pub fn toggled(self, target: PlaybackState) -> PlaybackState {
        if self == target {
            PlaybackState::Idle
        } else {
            target
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackState {
    type Err = ToneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(PlaybackState::Idle),
            "sound" | "tone" => Ok(PlaybackState::Tone),
            "noise" => Ok(PlaybackState::Noise),
            _ => Err(ToneError::UnknownState(s.to_string())),
        }
    }
}

/// Current values of the controllable parameters.
///
/// `volume` is in engine gain units; see [`volume_to_gain`] for the slider
/// mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioParameters {
    pub volume: f64,
    pub frequency: f64,
    #[serde(default = "default_q_factor")]
    pub q_factor: f64,
}

fn default_q_factor() -> f64 {
    DEFAULT_Q_FACTOR
}

impl AudioParameters {
    pub fn new(volume: f64, frequency: f64) -> Self {
        AudioParameters {
            volume,
            frequency,
            q_factor: DEFAULT_Q_FACTOR,
        }
    }

    pub fn with_q_factor(mut self, q_factor: f64) -> Self {
        self.q_factor = q_factor;
        self
    }
}

impl Default for AudioParameters {
    fn default() -> Self {
        AudioParameters::new(volume_to_gain(DEFAULT_VOLUME), DEFAULT_FREQUENCY)
    }
}

/// Convert a volume slider position into gain.
pub fn volume_to_gain(volume: f64) -> f64 {
    volume / VOLUME_SCALE
}

/// Clamp a frequency into the control's `[1, MAX_FREQUENCY]` range.
pub fn clamp_frequency(hz: f64) -> f64 {
    hz.clamp(1.0, MAX_FREQUENCY)
}

pub fn clamp_volume(volume: f64) -> f64 {
    volume.clamp(0.0, MAX_VOLUME)
}

pub fn clamp_q_factor(q: f64) -> f64 {
    q.clamp(0.0, MAX_Q_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!("idle".parse::<PlaybackState>().unwrap(), PlaybackState::Idle);
        assert_eq!("sound".parse::<PlaybackState>().unwrap(), PlaybackState::Tone);
        assert_eq!("Tone".parse::<PlaybackState>().unwrap(), PlaybackState::Tone);
        assert_eq!(" noise ".parse::<PlaybackState>().unwrap(), PlaybackState::Noise);
        assert!(matches!(
            "loud".parse::<PlaybackState>(),
            Err(ToneError::UnknownState(_))
        ));
    }

    #[test]
    fn serializes_with_ui_names() {
        assert_eq!(serde_json::to_string(&PlaybackState::Tone).unwrap(), "\"sound\"");
        let state: PlaybackState = serde_json::from_str("\"tone\"").unwrap();
        assert_eq!(state, PlaybackState::Tone);
    }

    #[test]
    fn toggle_stops_active_state_and_switches_otherwise() {
        assert_eq!(PlaybackState::Tone.toggled(PlaybackState::Tone), PlaybackState::Idle);
        assert_eq!(PlaybackState::Tone.toggled(PlaybackState::Noise), PlaybackState::Noise);
        assert_eq!(PlaybackState::Idle.toggled(PlaybackState::Tone), PlaybackState::Tone);
    }

    #[test]
    fn defaults_match_the_initial_controls() {
        let p = AudioParameters::default();
        assert_eq!(p.frequency, 3000.0);
        assert!((p.volume - 0.01).abs() < 1e-12);
        assert_eq!(p.q_factor, 1.0);
    }

    #[test]
    fn q_factor_is_optional_when_deserializing() {
        let p: AudioParameters = serde_json::from_str(r#"{"volume":0.5,"frequency":440}"#).unwrap();
        assert_eq!(p.q_factor, DEFAULT_Q_FACTOR);
    }

    #[test]
    fn clamps_follow_control_ranges() {
        assert_eq!(clamp_frequency(0.0), 1.0);
        assert_eq!(clamp_frequency(30000.0), MAX_FREQUENCY);
        assert_eq!(clamp_volume(-3.0), 0.0);
        assert_eq!(clamp_q_factor(9.0), MAX_Q_FACTOR);
    }
}
