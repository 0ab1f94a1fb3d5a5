//! Feeds identifiers through a [`WordPipeline`] and summarises the run.

use super::reversed_words::WordPipeline;
use crate::core::{MetricsSnapshot, StageKind, StageState};
use crate::errors::Result;
use crate::events::event_types;
use crate::stages::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// State and counters of one stage at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub name: String,
    /// Stage variant.
    pub kind: StageKind,
    /// Lifecycle state.
    pub state: StageState,
    /// Counter values.
    pub metrics: MetricsSnapshot,
}

impl StageReport {
    pub(super) fn of<I, O>(stage: &Stage<I, O>) -> Self
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        Self {
            name: stage.name().to_string(),
            kind: stage.kind(),
            state: stage.state(),
            metrics: stage.metrics().snapshot(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the driver started feeding identifiers.
    pub started_at: DateTime<Utc>,
    /// Wall time until the print stage completed.
    pub duration_ms: f64,
    /// Identifiers accepted by the source buffer.
    pub identifiers: usize,
    /// Words reported by the print stage.
    pub reversed_words: u64,
    /// Per-stage reports in chain order.
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    /// Converts to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Pushes every identifier into the pipeline, signals end of input and
/// waits for the print stage to finish.
///
/// Feeding stops early once any stage has faulted.
///
/// # Errors
///
/// Returns `StageError::Faulted` with the first fault that reached the print
/// stage, or the buffer's rejection if it was closed or faulted externally.
pub async fn run<I>(pipeline: &WordPipeline, identifiers: I) -> Result<RunSummary>
where
    I: IntoIterator<Item = String>,
{
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let start = Instant::now();

    info!(%run_id, "Pipeline run started");
    pipeline.events().try_emit(
        event_types::PIPELINE_STARTED,
        Some(serde_json::json!({
            "run_id": run_id.to_string(),
            "started_at": started_at.to_rfc3339(),
        })),
    );

    let mut submitted = 0;
    for identifier in identifiers {
        if let Some(fault) = pipeline.first_fault() {
            warn!(%run_id, fault = %fault, "Pipeline faulted, remaining identifiers skipped");
            break;
        }
        pipeline.accept(identifier).await?;
        submitted += 1;
    }
    pipeline.drain();

    let outcome = pipeline.completion().await;
    let summary = RunSummary {
        run_id,
        started_at,
        duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        identifiers: submitted,
        reversed_words: pipeline.reported_words(),
        stages: pipeline.stage_reports(),
    };

    let mut data = summary.to_json();
    data["error"] = outcome
        .as_ref()
        .err()
        .map_or(serde_json::Value::Null, |e| serde_json::json!(e.to_dict()));
    pipeline.events().try_emit(event_types::PIPELINE_COMPLETED, Some(data));

    match &outcome {
        Ok(()) => info!(
            %run_id,
            identifiers = summary.identifiers,
            reversed_words = summary.reversed_words,
            duration_ms = summary.duration_ms,
            "Pipeline run completed"
        ),
        Err(error) => warn!(
            %run_id,
            identifiers = summary.identifiers,
            reversed_words = summary.reversed_words,
            error = %error,
            "Pipeline run faulted"
        ),
    }

    outcome.map(|()| summary)
}
