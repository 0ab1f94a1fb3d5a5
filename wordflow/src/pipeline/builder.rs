//! Assembles the reversed-word pipeline from configuration.

use super::reversed_words::WordPipeline;
use super::stage_names;
use crate::config::PipelineConfig;
use crate::errors::{Result, StageError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::fetch::Fetcher;
use crate::stages::StageBuilder;
use crate::text::{decode_gzip, filter_dedupe, find_reversed, reverse_word, scan_pool, tokenize};
use std::sync::Arc;
use tracing::{debug, info};

/// Builder for [`WordPipeline`].
#[derive(Clone)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    fetcher: Arc<dyn Fetcher>,
    events: Arc<dyn EventSink>,
}

impl PipelineBuilder {
    /// Creates a builder with default configuration and no event reporting.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config: PipelineConfig::default(),
            fetcher,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the stage configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the sink receiving lifecycle events and reversed words.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Starts and links every stage.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` for an invalid configuration.
    pub fn build(self) -> Result<WordPipeline> {
        let Self { config, fetcher, events } = self;
        config.validate()?;
        let stage = |name: &str, options| {
            StageBuilder::new(name)
                .with_options(options)
                .with_events(Arc::clone(&events))
        };

        let buffer = stage(stage_names::BUFFER, config.buffer).buffer::<String>()?;

        let fetch = stage(stage_names::FETCH, config.fetch).transform(move |identifier: String| {
            let fetcher = Arc::clone(&fetcher);
            async move {
                info!(identifier = %identifier, "Downloading");
                let payload = fetcher.fetch(&identifier).await?;
                Ok::<_, StageError>(payload)
            }
        })?;

        let decode = stage(stage_names::DECODE, config.decode).transform(|payload: Vec<u8>| async move {
            let text = tokio::task::spawn_blocking(move || decode_gzip(&payload))
                .await
                .map_err(|e| StageError::Internal(format!("decode task failed: {e}")))??;
            debug!(chars = text.len(), "Decoded payload");
            Ok::<_, StageError>(text)
        })?;

        let split = stage(stage_names::TOKENIZE, config.tokenize).transform(|text: String| async move {
            let words = tokenize(&text);
            debug!(words = words.len(), "Tokenized text");
            Ok::<_, StageError>(words)
        })?;

        let filter = stage(stage_names::FILTER, config.filter).transform(|words: Vec<String>| async move {
            let kept = filter_dedupe(words);
            debug!(words = kept.len(), "Filtered words");
            Ok::<_, StageError>(kept)
        })?;

        let pool = Arc::new(scan_pool(config.scan_workers)?);
        let scan = stage(stage_names::FIND_REVERSED, config.find_reversed).transform_many(
            move |words: Vec<String>| {
                let pool = Arc::clone(&pool);
                async move {
                    let found = tokio::task::spawn_blocking(move || find_reversed(&words, &pool))
                        .await
                        .map_err(|e| StageError::Internal(format!("scan task failed: {e}")))?;
                    debug!(found = found.len(), "Scanned for reversed words");
                    Ok::<_, StageError>(found)
                }
            },
        )?;

        let report = Arc::clone(&events);
        let print = stage(stage_names::PRINT, config.print).sink(move |word: String| {
            let report = Arc::clone(&report);
            async move {
                let reversed = reverse_word(&word);
                info!(word = %word, reversed = %reversed, "Reversed word");
                report
                    .emit(
                        event_types::WORD_REVERSED,
                        Some(serde_json::json!({ "word": word, "reversed": reversed })),
                    )
                    .await;
                Ok::<(), StageError>(())
            }
        })?;

        buffer.link_to(&fetch)?;
        fetch.link_to(&decode)?;
        decode.link_to(&split)?;
        split.link_to(&filter)?;
        filter.link_to(&scan)?;
        scan.link_to(&print)?;

        Ok(WordPipeline {
            buffer,
            fetch,
            decode,
            tokenize: split,
            filter,
            find_reversed: scan,
            print,
            events,
        })
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
