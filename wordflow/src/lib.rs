//! # Wordflow
//!
//! A bounded, backpressure-aware stage pipeline that downloads gzip-compressed
//! documents and reports every word whose reversal also occurs in the same
//! document.
//!
//! Wordflow is built from generic stages:
//!
//! - **Bounded stages**: every stage holds at most `capacity` items, so a
//!   slow consumer suspends its producers instead of growing memory
//! - **Configurable concurrency**: each stage runs its own worker tasks
//! - **Completion and faults**: end of input and the first failure travel
//!   downstream through links
//! - **Event-driven observability**: lifecycle events and per-stage counters
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wordflow::prelude::*;
//! use std::sync::Arc;
//!
//! let pipeline = PipelineBuilder::new(Arc::new(FileFetcher::new()))
//!     .with_events(Arc::new(LoggingEventSink::default()))
//!     .build()?;
//!
//! let summary = run(&pipeline, read_identifiers("resources.txt").await?).await?;
//! println!("{} reversed words", summary.reversed_words);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod fetch;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod text;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{FetchConfig, PipelineConfig, StageOptions};
    pub use crate::core::{MetricsSnapshot, StageKind, StageMetrics, StageState};
    pub use crate::errors::{DecodeError, Fault, FetchError, StageError};
    pub use crate::events::{
        event_types, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::fetch::{FileFetcher, Fetcher};
    #[cfg(feature = "http")]
    pub use crate::fetch::HttpFetcher;
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        parse_identifiers, read_identifiers, run, PipelineBuilder, RunSummary, StageReport,
        WordPipeline,
    };
    pub use crate::stages::{SinkStage, Stage, StageBuilder, TryAcceptError};
}
