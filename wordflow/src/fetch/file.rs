//! Local file retrieval.

use super::Fetcher;
use crate::errors::FetchError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

const FILE_SCHEME: &str = "file://";

/// Reads identifiers as local paths. A `file://` prefix is accepted.
///
/// Relative paths resolve against the base directory when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    base_dir: Option<PathBuf>,
}

impl FileFetcher {
    /// Creates a fetcher resolving relative paths against the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative paths against `base_dir`.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Maps an identifier to the path that will be read.
    #[must_use]
    pub fn resolve(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier.strip_prefix(FILE_SCHEME).unwrap_or(identifier));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(identifier);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FetchError::new(identifier, format!("{}: {e}", path.display())))?;
        debug!(identifier, bytes = bytes.len(), "Read local resource");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve() {
        let fetcher = FileFetcher::new().with_base_dir("/data");
        assert_eq!(fetcher.resolve("file://book.gz"), PathBuf::from("/data/book.gz"));
        assert_eq!(fetcher.resolve("/abs/book.gz"), PathBuf::from("/abs/book.gz"));
        assert_eq!(FileFetcher::new().resolve("book.gz"), PathBuf::from("book.gz"));
    }

    #[tokio::test]
    async fn test_fetch_reads_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        let identifier = format!("file://{}", file.path().display());

        let bytes = FileFetcher::new().fetch(&identifier).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FileFetcher::new().with_base_dir(dir.path());

        let err = fetcher.fetch("missing.gz").await.unwrap_err();
        assert_eq!(err.identifier, "missing.gz");
        assert!(err.message.contains("missing.gz"));
    }
}
