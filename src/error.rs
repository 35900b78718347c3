use crate::engine::{NodeId, Param};
use std::fmt;

/// Errors raised by an audio engine context.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A processor module could not be loaded or registered.
    ModuleLoad { name: String, reason: String },
    /// No processor module is registered under this name.
    UnknownProcessor(String),
    /// The node does not exist (never created, or already released).
    UnknownNode(NodeId),
    /// The node kind has no such parameter.
    UnsupportedParam { node: NodeId, param: Param },
    /// The engine refused a parameter value (NaN or infinite).
    InvalidParam { param: Param, value: f64 },
    /// Operation not valid in the node's current lifecycle state.
    InvalidState(&'static str),
    /// Rejected connect/disconnect request.
    InvalidConnection(&'static str),
    /// The platform refused to start audio without a user gesture.
    NotAllowed,
}

/// Errors surfaced by the signal controller and its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum ToneError {
    /// A state transition or readback was requested before `initialize()` succeeded.
    NotInitialized,
    Engine(EngineError),
    /// A playback state name that is not one of `idle`, `sound`, `noise`.
    UnknownState(String),
    Preferences(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ModuleLoad { name, reason } => {
                write!(f, "Failed to load processor module '{name}': {reason}")
            }
            EngineError::UnknownProcessor(name) => {
                write!(f, "No processor registered under '{name}'")
            }
            EngineError::UnknownNode(id) => write!(f, "Unknown node {id}"),
            EngineError::UnsupportedParam { node, param } => {
                write!(f, "Node {node} has no {param:?} parameter")
            }
            EngineError::InvalidParam { param, value } => {
                write!(f, "Invalid value {value} for {param:?}")
            }
            EngineError::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            EngineError::InvalidConnection(msg) => write!(f, "Invalid connection: {msg}"),
            EngineError::NotAllowed => {
                write!(f, "Audio playback is not allowed until the user interacts with the page")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl fmt::Display for ToneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToneError::NotInitialized => write!(f, "Audio controller is not initialized"),
            ToneError::Engine(e) => write!(f, "Audio engine error: {e}"),
            ToneError::UnknownState(s) => write!(f, "Unknown playback state '{s}'"),
            ToneError::Preferences(msg) => write!(f, "Preference store error: {msg}"),
        }
    }
}

impl std::error::Error for ToneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToneError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for ToneError {
    fn from(e: EngineError) -> Self {
        ToneError::Engine(e)
    }
}

impl From<serde_json::Error> for ToneError {
    fn from(e: serde_json::Error) -> Self {
        ToneError::Preferences(e.to_string())
    }
}

impl From<std::io::Error> for ToneError {
    fn from(e: std::io::Error) -> Self {
        ToneError::Preferences(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_wraps_with_source() {
        let err: ToneError = EngineError::NotAllowed.into();
        assert!(matches!(err, ToneError::Engine(EngineError::NotAllowed)));
        assert!(std::error::Error::source(&err).is_some());
        assert!(format!("{err}").contains("user interacts"));
    }

    #[test]
    fn module_load_message_names_module() {
        let err = EngineError::ModuleLoad {
            name: "white-noise-processor".to_string(),
            reason: "boom".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("white-noise-processor"));
        assert!(msg.contains("boom"));
    }
}
