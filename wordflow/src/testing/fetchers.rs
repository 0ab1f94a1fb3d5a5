//! In-memory fetcher for tests and demos.

use crate::errors::FetchError;
use crate::fetch::Fetcher;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

/// Gzip-compresses text.
pub fn gzip_text(text: &str) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()
}

#[derive(Debug, Clone)]
enum Payload {
    Text(String),
    Raw(Vec<u8>),
    Failure(String),
}

/// A fetcher serving canned payloads by identifier.
///
/// Unknown identifiers fail with a not-found [`FetchError`].
#[derive(Debug, Default)]
pub struct StaticFetcher {
    payloads: HashMap<String, Payload>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    /// Creates an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `text` gzip-compressed for `identifier`.
    #[must_use]
    pub fn with_document(mut self, identifier: impl Into<String>, text: impl Into<String>) -> Self {
        self.payloads.insert(identifier.into(), Payload::Text(text.into()));
        self
    }

    /// Serves `bytes` unchanged for `identifier`.
    #[must_use]
    pub fn with_raw(mut self, identifier: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.payloads.insert(identifier.into(), Payload::Raw(bytes));
        self
    }

    /// Fails every fetch of `identifier` with `message`.
    #[must_use]
    pub fn with_failure(mut self, identifier: impl Into<String>, message: impl Into<String>) -> Self {
        self.payloads.insert(identifier.into(), Payload::Failure(message.into()));
        self
    }

    /// Sleeps before answering each fetch.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the identifiers fetched so far, in request order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().push(identifier.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.payloads.get(identifier) {
            Some(Payload::Text(text)) => {
                gzip_text(text).map_err(|e| FetchError::new(identifier, e.to_string()))
            }
            Some(Payload::Raw(bytes)) => Ok(bytes.clone()),
            Some(Payload::Failure(message)) => Err(FetchError::new(identifier, message.clone())),
            None => Err(FetchError::new(identifier, "not found").with_status(404)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::decode_gzip;

    #[tokio::test]
    async fn test_static_fetcher_payloads() {
        let fetcher = StaticFetcher::new()
            .with_document("doc", "live evil")
            .with_raw("raw", vec![7])
            .with_failure("down", "connection reset");

        assert_eq!(decode_gzip(&fetcher.fetch("doc").await.unwrap()).unwrap(), "live evil");
        assert_eq!(fetcher.fetch("raw").await.unwrap(), vec![7]);
        assert_eq!(fetcher.fetch("down").await.unwrap_err().message, "connection reset");
        assert_eq!(fetcher.fetch("nope").await.unwrap_err().status, Some(404));
        assert_eq!(fetcher.requests(), vec!["doc", "raw", "down", "nope"]);
    }
}
