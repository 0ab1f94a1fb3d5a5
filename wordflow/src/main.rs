//! Command-line driver: reads identifiers, runs the pipeline and prints every
//! reversed word.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use wordflow::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "wordflow")]
#[command(about = "Finds words whose reversal appears in the same downloaded document", long_about = None)]
#[command(version)]
struct Cli {
    /// File with one resource identifier per line.
    #[arg(default_value = "resources.txt")]
    input: PathBuf,

    /// JSON pipeline configuration; missing fields take defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Treat identifiers as local file paths instead of URLs.
    #[arg(long)]
    local: bool,

    /// Log line format (text or json).
    #[arg(long, default_value = "text", env = "WORDFLOW_LOG_FORMAT")]
    log_format: LogFormat,

    /// Override the number of reversed-word scan threads.
    #[arg(long)]
    scan_workers: Option<usize>,
}

/// Prints reversed words to stdout and logs every other event.
#[derive(Debug, Default)]
struct WordPrinter {
    log: LoggingEventSink,
}

impl WordPrinter {
    fn print(&self, event_type: &str, data: Option<&serde_json::Value>) -> bool {
        if event_type != event_types::WORD_REVERSED {
            return false;
        }
        let field = |name: &str| {
            data.and_then(|d| d.get(name))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
        };
        println!("{} <- {}", field("word"), field("reversed"));
        true
    }
}

#[async_trait]
impl EventSink for WordPrinter {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        if !self.print(event_type, data.as_ref()) {
            self.log.emit(event_type, data).await;
        }
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        if !self.print(event_type, data.as_ref()) {
            self.log.try_emit(event_type, data);
        }
    }
}

fn fetcher(cli: &Cli, config: &PipelineConfig) -> Result<Arc<dyn Fetcher>> {
    if cli.local {
        return Ok(Arc::new(FileFetcher::new()));
    }
    #[cfg(feature = "http")]
    {
        let http = HttpFetcher::new(config.fetch_client.clone()).context("failed to create HTTP fetcher")?;
        Ok(Arc::new(http))
    }
    #[cfg(not(feature = "http"))]
    {
        let _ = config;
        anyhow::bail!("built without HTTP support; pass --local to read files")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(workers) = cli.scan_workers {
        config = config.with_scan_workers(workers);
    }

    let identifiers = read_identifiers(&cli.input)
        .await
        .with_context(|| format!("failed to read identifiers from {}", cli.input.display()))?;

    let pipeline = PipelineBuilder::new(fetcher(&cli, &config)?)
        .with_config(config)
        .with_events(Arc::new(WordPrinter::default()))
        .build()
        .context("failed to assemble pipeline")?;

    let summary = run(&pipeline, identifiers).await.context("pipeline run failed")?;
    tracing::info!(
        run_id = %summary.run_id,
        identifiers = summary.identifiers,
        reversed_words = summary.reversed_words,
        duration_ms = summary.duration_ms,
        "Done"
    );
    Ok(())
}
