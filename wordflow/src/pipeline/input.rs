//! Identifier input parsing.

use crate::errors::Result;
use std::path::Path;

/// Parses newline-delimited identifiers.
///
/// Surrounding whitespace is trimmed; blank lines and lines starting with
/// `#` are skipped.
pub fn parse_identifiers(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Reads and parses an identifier file.
///
/// # Errors
///
/// Returns `StageError::Io` if the file cannot be read.
pub async fn read_identifiers(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_identifiers(&text))
}
