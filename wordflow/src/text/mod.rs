//! Text transformations applied by the pipeline stages.
//!
//! - gzip decoding of fetched payloads
//! - word splitting and filtering
//! - reversed-word detection

mod decode;
mod reversed;
mod words;

pub use decode::decode_gzip;
pub use reversed::{find_reversed, reverse_word, scan_pool};
pub use words::{filter_dedupe, is_letter, tokenize, MIN_WORD_LEN};
