//! Stage lifecycle state and variant kind.

use crate::errors::Fault;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The behavioural variant of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Passthrough entry point fed by the driver.
    Buffer,
    /// One output per input.
    Transform,
    /// Zero or more outputs per input.
    TransformMany,
    /// Terminal stage with no output.
    Sink,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer => write!(f, "buffer"),
            Self::Transform => write!(f, "transform"),
            Self::TransformMany => write!(f, "transform_many"),
            Self::Sink => write!(f, "sink"),
        }
    }
}

/// The lifecycle state of a stage.
///
/// `Open -> Draining -> Completed`, or `Open | Draining -> Faulted`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "fault")]
pub enum StageState {
    /// Accepting input.
    #[default]
    Open,
    /// No new input; queued work continues.
    Draining,
    /// All accepted work was processed and forwarded.
    Completed,
    /// A transformation failed here or upstream.
    Faulted(Fault),
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Draining => write!(f, "draining"),
            Self::Completed => write!(f, "completed"),
            Self::Faulted(_) => write!(f, "faulted"),
        }
    }
}

impl StageState {
    /// Returns true if the state will never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Faulted(_))
    }

    /// Returns true if the stage still takes input.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the fault, if any.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Faulted(fault) => Some(fault),
            _ => None,
        }
    }
}
