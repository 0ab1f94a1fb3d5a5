//! Word splitting and filtering.

use std::collections::HashSet;
use unicode_general_category::{get_general_category, GeneralCategory};

/// Words must be longer than this many characters to survive filtering.
pub const MIN_WORD_LEN: usize = 3;

/// Returns true for characters in the Unicode letter categories (`L*`).
///
/// Combining marks and letter numbers are not letters here.
pub fn is_letter(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
    )
}

/// Splits text into words.
///
/// Every non-letter character acts as a separator; empty fragments are
/// dropped and the original order is kept.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !is_letter(c))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keeps words longer than [`MIN_WORD_LEN`] characters and removes
/// duplicates, preserving first occurrences.
pub fn filter_dedupe(words: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(words.len());
    words
        .into_iter()
        .filter(|word| word.chars().count() > MIN_WORD_LEN)
        .filter(|word| seen.insert(word.clone()))
        .collect()
}
