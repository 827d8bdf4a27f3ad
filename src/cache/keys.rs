use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::utils::CacheError;

const SEGMENT_SEPARATOR: char = ':';
const ESCAPE: char = '\\';

/// Compute the voice cache key for a voice sample: the hex SHA256 of its bytes.
///
/// File names and upload times play no part, so byte-identical samples
/// always share a key.
pub fn voice_key(sample: &[u8]) -> Result<String, CacheError> {
    if sample.is_empty() {
        return Err(CacheError::missing("voice sample"));
    }
    Ok(content_hash(sample))
}

/// Hex SHA256 of arbitrary bytes
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Compute the voice cache key for a sample stored on disk
pub fn voice_key_for_file(path: &Path) -> anyhow::Result<String> {
    let content = fs::read(path)?;
    Ok(voice_key(&content)?)
}

/// Compute the narration cache key for one page of a story read by one narrator.
///
/// Segments are escaped before joining so that ids containing the separator
/// cannot make two different triples produce the same key.
pub fn narration_key(story_id: &str, narrator_id: &str, page: usize) -> Result<String, CacheError> {
    if story_id.trim().is_empty() {
        return Err(CacheError::missing("story id"));
    }
    if narrator_id.trim().is_empty() {
        return Err(CacheError::missing("narrator id"));
    }

    Ok(format!(
        "{}{sep}{}{sep}{}",
        escape_segment(story_id),
        escape_segment(narrator_id),
        page,
        sep = SEGMENT_SEPARATOR
    ))
}

fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for ch in segment.chars() {
        if ch == SEGMENT_SEPARATOR || ch == ESCAPE {
            escaped.push(ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}
