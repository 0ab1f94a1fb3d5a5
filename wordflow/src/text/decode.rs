//! Gzip payload decoding.

use crate::errors::DecodeError;
use flate2::read::MultiGzDecoder;
use std::io::Read;

/// Decompresses a gzip payload and decodes it as UTF-8 text.
///
/// Concatenated gzip members are decoded as one stream.
pub fn decode_gzip(payload: &[u8]) -> Result<String, DecodeError> {
    let mut raw = Vec::with_capacity(payload.len().saturating_mul(4));
    MultiGzDecoder::new(payload)
        .read_to_end(&mut raw)
        .map_err(|e| DecodeError::new(format!("malformed gzip payload: {e}")))?;

    String::from_utf8(raw).map_err(|e| DecodeError::new(format!("payload is not UTF-8: {e}")))
}
