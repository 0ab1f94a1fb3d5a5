//! The reversed-word pipeline.
//!
//! This module provides:
//! - Assembly of the seven linked stages
//! - The driver feeding identifiers and awaiting completion
//! - Input file parsing

mod builder;
mod driver;
mod input;
mod reversed_words;


pub use builder::PipelineBuilder;
pub use driver::{run, RunSummary, StageReport};
pub use input::{parse_identifiers, read_identifiers};
pub use reversed_words::WordPipeline;

/// Stage names, in chain order.
pub mod stage_names {
    /// Source buffer fed by the driver.
    pub const BUFFER: &str = "buffer";
    /// Resource retrieval.
    pub const FETCH: &str = "fetch";
    /// Gzip decoding.
    pub const DECODE: &str = "decode";
    /// Word splitting.
    pub const TOKENIZE: &str = "tokenize";
    /// Length filter and dedupe.
    pub const FILTER: &str = "filter";
    /// Reversed-word scan.
    pub const FIND_REVERSED: &str = "find_reversed";
    /// Terminal reporting stage.
    pub const PRINT: &str = "print";
}
