//! Resource retrieval.
//!
//! The fetch stage resolves each identifier to the raw (still compressed)
//! payload through a [`Fetcher`].

mod file;
#[cfg(feature = "http")]
mod http;

pub use file::FileFetcher;
#[cfg(feature = "http")]
pub use http::HttpFetcher;

use crate::errors::FetchError;
use async_trait::async_trait;

/// Resolves an identifier to its raw payload bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the payload for `identifier`.
    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, FetchError>;
}
