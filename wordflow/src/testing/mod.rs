//! Testing utilities for wordflow pipelines.
//!
//! This module provides:
//! - An in-memory fetcher serving canned documents
//! - Gzip helpers for building payloads

mod fetchers;

pub use fetchers::{gzip_text, StaticFetcher};
