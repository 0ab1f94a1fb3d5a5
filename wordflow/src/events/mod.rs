//! Event sink system for observability.
//!
//! Stages report lifecycle transitions and the pipeline reports its results
//! through an [`EventSink`]. Sinks are passed explicitly; there is no global
//! sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event types emitted by the engine and the pipeline.
pub mod event_types {
    /// A stage stopped taking input.
    pub const STAGE_DRAINED: &str = "stage.drained";
    /// A stage processed and forwarded all accepted work.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage faulted.
    pub const STAGE_FAULTED: &str = "stage.faulted";
    /// A reversed word reached the sink.
    pub const WORD_REVERSED: &str = "word.reversed";
    /// The driver started feeding identifiers.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// The sink completed.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
}
