//! Error types for the wordflow pipeline.
//!
//! Every per-item failure inside a stage escalates to a whole-stage fault.
//! Faults travel downstream through links and are never sent upstream.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = StageError> = std::result::Result<T, E>;

/// The main error type for wordflow operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// Retrieving a resource failed.
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// A payload could not be decompressed or decoded.
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// Input was offered after the stage started draining.
    #[error("Stage '{stage}' is closed to new input")]
    Closed {
        /// The stage name.
        stage: String,
    },

    /// Input was offered to, or produced by, a stage that already failed.
    #[error("Stage '{stage}' faulted: {fault}")]
    Faulted {
        /// The stage that reported the fault.
        stage: String,
        /// The fault carried by the stage.
        fault: Fault,
    },

    /// A link could not be established.
    #[error("Cannot link stage '{stage}': {reason}")]
    Link {
        /// The source stage.
        stage: String,
        /// Why the link was refused.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// Creates a closed-stage error.
    #[must_use]
    pub fn closed(stage: impl Into<String>) -> Self {
        Self::Closed {
            stage: stage.into(),
        }
    }

    /// Creates a faulted-stage error.
    #[must_use]
    pub fn faulted(stage: impl Into<String>, fault: Fault) -> Self {
        Self::Faulted {
            stage: stage.into(),
            fault,
        }
    }

    /// Returns the fault if this error reports a faulted stage.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Faulted { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in event payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "FetchError",
            Self::Decode(_) => "DecodeError",
            Self::Closed { .. } => "StageClosed",
            Self::Faulted { .. } => "StageFaulted",
            Self::Link { .. } => "LinkError",
            Self::Config(_) => "ConfigError",
            Self::Internal(_) => "InternalError",
            Self::Io(_) => "IoError",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::Faulted { stage, fault } = self {
            map.insert("stage".to_string(), serde_json::json!(stage));
            map.insert("origin".to_string(), serde_json::json!(fault.origin));
        }
        map
    }
}

/// The reason a stage faulted.
///
/// A fault keeps the name of the stage where it originated so that every
/// downstream stage reports the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// The stage whose transformation failed.
    pub origin: String,
    /// The error message.
    pub message: String,
}

impl Fault {
    /// Creates a new fault.
    #[must_use]
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Creates a fault from an error raised by `origin`.
    #[must_use]
    pub fn from_error(origin: impl Into<String>, error: &StageError) -> Self {
        Self::new(origin, error.to_string())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.origin, self.message)
    }
}

/// Error raised when a resource cannot be retrieved.
#[derive(Debug, Clone, Error)]
#[error("Fetch failed for '{identifier}': {message}")]
pub struct FetchError {
    /// The resource identifier.
    pub identifier: String,
    /// The transport error message.
    pub message: String,
    /// HTTP status code, when one was received.
    pub status: Option<u16>,
}

impl FetchError {
    /// Creates a new fetch error.
    #[must_use]
    pub fn new(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Sets the status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Error raised when a payload is not valid gzip or not valid text.
#[derive(Debug, Clone, Error)]
#[error("Decode failed: {message}")]
pub struct DecodeError {
    /// The error message.
    pub message: String,
}

impl DecodeError {
    /// Creates a new decode error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
