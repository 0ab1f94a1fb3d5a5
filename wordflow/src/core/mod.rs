//! Core model types for wordflow.
//!
//! This module contains the types shared by every stage:
//! - Stage lifecycle state and variant kind
//! - Per-stage atomic counters

mod metrics;
mod status;

pub use metrics::{MetricsSnapshot, StageMetrics};
pub use status::{StageKind, StageState};
