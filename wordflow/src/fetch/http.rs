//! HTTP retrieval backed by reqwest.

use super::Fetcher;
use crate::config::FetchConfig;
use crate::errors::{FetchError, Result, StageError};
use async_trait::async_trait;
use tracing::debug;

/// Fetches identifiers as URLs with a shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Creates a fetcher with the given client settings.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` if the HTTP client cannot be built.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout()?)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StageError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Returns the client settings.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, identifier: &str, size: u64) -> FetchError {
        FetchError::new(
            identifier,
            format!(
                "response of {size} bytes exceeds limit of {} bytes",
                self.config.max_response_size
            ),
        )
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, identifier: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let limit = u64::try_from(self.config.max_response_size).unwrap_or(u64::MAX);

        let response = self
            .client
            .get(identifier)
            .send()
            .await
            .map_err(|e| FetchError::new(identifier, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(identifier, format!("HTTP {status}")).with_status(status.as_u16()));
        }
        if let Some(length) = response.content_length() {
            if length > limit {
                return Err(self.too_large(identifier, length));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(identifier, e.to_string()))?;
        if body.len() as u64 > limit {
            return Err(self.too_large(identifier, body.len() as u64));
        }

        debug!(identifier, bytes = body.len(), status = status.as_u16(), "Fetched resource");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_config() {
        let fetcher = HttpFetcher::new(FetchConfig::default().with_user_agent("probe/1.0")).unwrap();
        assert_eq!(fetcher.config().user_agent, "probe/1.0");
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let result = HttpFetcher::new(FetchConfig::default().with_timeout(-1.0));
        assert!(matches!(result, Err(StageError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_url_is_fetch_error() {
        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert_eq!(err.identifier, "not a url");
        assert!(err.status.is_none());
    }
}
