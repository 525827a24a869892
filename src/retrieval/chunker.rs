//! Fixed-size overlapping text chunker
//!
//! Windows are measured in characters, not bytes, so multi-byte text never
//! splits inside a code point.

use crate::error::{Result, ServiceError};

/// Split `text` into overlapping windows of at most `size` characters.
///
/// Starts at offset 0 and advances by `size - overlap` until the whole text
/// is covered; the final chunk is clipped to the text length. Empty text
/// yields an empty vector. `overlap >= size` would make the step
/// non-positive and is rejected as a configuration error.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    if size == 0 {
        return Err(ServiceError::InvalidConfiguration(
            "chunk size must be positive".to_string(),
        ));
    }
    if overlap >= size {
        return Err(ServiceError::InvalidConfiguration(format!(
            "overlap {} must be smaller than chunk size {}",
            overlap, size
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }

    Ok(chunks)
}
