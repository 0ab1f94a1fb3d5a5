//! Configuration types for stages, fetching and the assembled pipeline.

use crate::errors::{Result, StageError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default inbound capacity for stages without a tighter bound.
pub const DEFAULT_CAPACITY: usize = 64;

/// Default inbound capacity of the source buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10;

/// Queue and worker settings for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOptions {
    /// Maximum items held by the stage, queued plus in process.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Maximum simultaneously running transformations.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Capacity of the outbound queue feeding the link.
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_concurrency() -> usize {
    1
}

fn default_output_capacity() -> usize {
    1
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            concurrency: default_concurrency(),
            output_capacity: default_output_capacity(),
        }
    }
}

impl StageOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inbound capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the concurrency degree.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the outbound capacity.
    #[must_use]
    pub fn with_output_capacity(mut self, output_capacity: usize) -> Self {
        self.output_capacity = output_capacity;
        self
    }

    /// Checks that every bound is non-zero.
    pub fn validate(&self, stage: &str) -> Result<()> {
        if self.capacity == 0 {
            return Err(StageError::Config(format!("stage '{stage}': capacity must be at least 1")));
        }
        if self.concurrency == 0 {
            return Err(StageError::Config(format!(
                "stage '{stage}': concurrency must be at least 1"
            )));
        }
        if self.output_capacity == 0 {
            return Err(StageError::Config(format!(
                "stage '{stage}': output_capacity must be at least 1"
            )));
        }
        Ok(())
    }
}

/// Configuration for HTTP fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum response size in bytes.
    #[serde(default = "default_max_size")]
    pub max_response_size: usize,
}

fn default_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    format!("wordflow/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_size() -> usize {
    32 * 1024 * 1024 // 32MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            max_response_size: default_max_size(),
        }
    }
}

impl FetchConfig {
    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Gets timeout as Duration.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` unless the timeout is a positive,
    /// representable number of seconds.
    pub fn timeout(&self) -> Result<Duration> {
        match Duration::try_from_secs_f64(self.timeout_seconds) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            Ok(_) => Err(StageError::Config("fetch_client.timeout_seconds must be positive".to_string())),
            Err(e) => Err(StageError::Config(format!(
                "fetch_client.timeout_seconds {} is invalid: {e}",
                self.timeout_seconds
            ))),
        }
    }
}

/// Settings for every stage of the reversed-word pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source buffer fed by the driver.
    #[serde(default = "default_buffer")]
    pub buffer: StageOptions,
    /// Resource retrieval.
    #[serde(default = "default_fetch")]
    pub fetch: StageOptions,
    /// Gzip decoding.
    #[serde(default)]
    pub decode: StageOptions,
    /// Word splitting.
    #[serde(default)]
    pub tokenize: StageOptions,
    /// Length filter and dedupe.
    #[serde(default)]
    pub filter: StageOptions,
    /// Reversed-word scan.
    #[serde(default)]
    pub find_reversed: StageOptions,
    /// Terminal reporting stage.
    #[serde(default)]
    pub print: StageOptions,
    /// Worker threads used by the reversed-word scan of one document.
    #[serde(default = "default_scan_workers")]
    pub scan_workers: usize,
    /// HTTP client settings.
    #[serde(default)]
    pub fetch_client: FetchConfig,
}

fn default_buffer() -> StageOptions {
    StageOptions::default().with_capacity(DEFAULT_BUFFER_CAPACITY)
}

fn default_fetch() -> StageOptions {
    StageOptions::default().with_capacity(1)
}

fn default_scan_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get().min(8))
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer: default_buffer(),
            fetch: default_fetch(),
            decode: StageOptions::default(),
            tokenize: StageOptions::default(),
            filter: StageOptions::default(),
            find_reversed: StageOptions::default(),
            print: StageOptions::default(),
            scan_workers: default_scan_workers(),
            fetch_client: FetchConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| StageError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the scan worker count.
    #[must_use]
    pub fn with_scan_workers(mut self, workers: usize) -> Self {
        self.scan_workers = workers;
        self
    }

    /// Sets the decode stage options.
    #[must_use]
    pub fn with_decode(mut self, options: StageOptions) -> Self {
        self.decode = options;
        self
    }

    /// Sets the fetch stage options.
    #[must_use]
    pub fn with_fetch(mut self, options: StageOptions) -> Self {
        self.fetch = options;
        self
    }

    /// Validates every stage and the scan pool size.
    pub fn validate(&self) -> Result<()> {
        self.buffer.validate("buffer")?;
        self.fetch.validate("fetch")?;
        self.decode.validate("decode")?;
        self.tokenize.validate("tokenize")?;
        self.filter.validate("filter")?;
        self.find_reversed.validate("find_reversed")?;
        self.print.validate("print")?;
        if self.scan_workers == 0 {
            return Err(StageError::Config("scan_workers must be at least 1".to_string()));
        }
        self.fetch_client.timeout()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer.capacity, DEFAULT_BUFFER_CAPACITY);
        assert_eq!(config.fetch.capacity, 1);
        assert_eq!(config.fetch.concurrency, 1);
        assert_eq!(config.decode, StageOptions::default());
        assert!(config.scan_workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stage_options_validate() {
        assert!(StageOptions::new().with_capacity(0).validate("x").is_err());
        assert!(StageOptions::new().with_concurrency(0).validate("x").is_err());
        assert!(StageOptions::new().with_output_capacity(0).validate("x").is_err());
        assert!(StageOptions::new().validate("x").is_ok());
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"decode": {{"concurrency": 4}}, "scan_workers": 2, "fetch_client": {{"timeout_seconds": 5}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.decode.concurrency, 4);
        assert_eq!(config.decode.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.scan_workers, 2);
        assert_eq!(config.buffer.capacity, DEFAULT_BUFFER_CAPACITY);
        assert_eq!(config.fetch_client.timeout().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_json_file_rejects_zero_workers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scan_workers": 0}}"#).unwrap();

        let err = PipelineConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
    }

    #[test]
    fn test_from_json_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(matches!(
            PipelineConfig::from_json_file(file.path()),
            Err(StageError::Config(_))
        ));
    }

    #[test]
    fn test_fetch_config_builders() {
        let config = FetchConfig::default()
            .with_timeout(2.5)
            .with_user_agent("test-agent")
            .with_max_response_size(1024);
        assert_eq!(config.timeout().unwrap(), Duration::from_millis(2500));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.max_response_size, 1024);
    }

    #[test]
    fn test_invalid_timeouts_are_config_errors() {
        for seconds in [-1.0, 0.0, f64::NAN, f64::INFINITY, 1e300] {
            let config = FetchConfig::default().with_timeout(seconds);
            assert!(
                matches!(config.timeout(), Err(StageError::Config(_))),
                "timeout {seconds} accepted"
            );
        }
        let pipeline = PipelineConfig {
            fetch_client: FetchConfig::default().with_timeout(-1.0),
            ..PipelineConfig::default()
        };
        assert!(matches!(pipeline.validate(), Err(StageError::Config(_))));
    }
}
