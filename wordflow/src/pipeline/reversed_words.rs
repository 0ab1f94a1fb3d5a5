//! The assembled seven-stage pipeline.

use super::driver::StageReport;
use crate::errors::{Fault, Result};
use crate::events::EventSink;
use crate::stages::{SinkStage, Stage};
use std::sync::Arc;

/// Buffer, fetch, decode, tokenize, filter, scan and print, linked in order.
///
/// Built by [`PipelineBuilder`](super::PipelineBuilder).
pub struct WordPipeline {
    pub(super) buffer: Stage<String, String>,
    pub(super) fetch: Stage<String, Vec<u8>>,
    pub(super) decode: Stage<Vec<u8>, String>,
    pub(super) tokenize: Stage<String, Vec<String>>,
    pub(super) filter: Stage<Vec<String>, Vec<String>>,
    pub(super) find_reversed: Stage<Vec<String>, String>,
    pub(super) print: SinkStage<String>,
    pub(super) events: Arc<dyn EventSink>,
}

impl WordPipeline {
    /// Offers an identifier to the source buffer, waiting while it is full.
    ///
    /// # Errors
    ///
    /// `StageError::Closed` after [`drain`](Self::drain), `StageError::Faulted`
    /// if the buffer was faulted.
    pub async fn accept(&self, identifier: impl Into<String>) -> Result<()> {
        self.buffer.accept(identifier.into()).await
    }

    /// Signals end of input.
    pub fn drain(&self) {
        self.buffer.drain();
    }

    /// Faults the source buffer; the fault travels down the whole chain.
    pub fn fault(&self, fault: Fault) {
        self.buffer.fault(fault);
    }

    /// Waits until the print stage is terminal.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Faulted` carrying the first fault that reached it.
    pub async fn completion(&self) -> Result<()> {
        self.print.completion().await
    }

    /// Returns the fault of the first faulting stage in chain order, if any.
    #[must_use]
    pub fn first_fault(&self) -> Option<Fault> {
        self.buffer
            .fault_reason()
            .or_else(|| self.fetch.fault_reason())
            .or_else(|| self.decode.fault_reason())
            .or_else(|| self.tokenize.fault_reason())
            .or_else(|| self.filter.fault_reason())
            .or_else(|| self.find_reversed.fault_reason())
            .or_else(|| self.print.fault_reason())
    }

    /// Returns state and counters of every stage, in chain order.
    #[must_use]
    pub fn stage_reports(&self) -> Vec<StageReport> {
        vec![
            StageReport::of(&self.buffer),
            StageReport::of(&self.fetch),
            StageReport::of(&self.decode),
            StageReport::of(&self.tokenize),
            StageReport::of(&self.filter),
            StageReport::of(&self.find_reversed),
            StageReport::of(&self.print),
        ]
    }

    /// Number of words reported by the print stage so far.
    #[must_use]
    pub fn reported_words(&self) -> u64 {
        self.print.metrics().processed()
    }

    pub(super) fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }
}

impl std::fmt::Debug for WordPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPipeline")
            .field("stages", &self.stage_reports())
            .finish_non_exhaustive()
    }
}
