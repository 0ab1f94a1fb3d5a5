//! Reversed-word detection.

use crate::errors::{Result, StageError};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::HashSet;

/// Reverses the characters of a word.
pub fn reverse_word(word: &str) -> String {
    word.chars().rev().collect()
}

/// Builds the thread pool the scan runs on.
///
/// # Errors
///
/// Returns `StageError::Config` for zero workers or if the pool cannot start.
pub fn scan_pool(workers: usize) -> Result<ThreadPool> {
    if workers == 0 {
        return Err(StageError::Config("scan_workers must be at least 1".to_string()));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("wordflow-scan-{i}"))
        .build()
        .map_err(|e| StageError::Config(format!("failed to build scan pool: {e}")))
}

/// Returns every word whose reversal is a different word of the same
/// collection.
///
/// The lookup runs on `pool`; results keep input order and each qualifying
/// word is returned once.
pub fn find_reversed(words: &[String], pool: &ThreadPool) -> Vec<String> {
    let set: HashSet<&str> = words.iter().map(String::as_str).collect();

    let found: Vec<&str> = pool.install(|| {
        words
            .par_iter()
            .map(String::as_str)
            .filter(|word| {
                let reversed = reverse_word(word);
                reversed != *word && set.contains(reversed.as_str())
            })
            .collect()
    });

    let mut emitted = HashSet::with_capacity(found.len());
    found
        .into_iter()
        .filter(|word| emitted.insert(*word))
        .map(str::to_string)
        .collect()
}
