
use serde::{Deserialize, Serialize};

const TITLE_MAX_CHARS: usize = 80;
const TITLE_MIN_WORDS: usize = 5;
const TITLE_FALLBACK_WORDS: usize = 7;

/// Configuration for word-window chunking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Number of words per chunk
    pub chunk_size: usize,
    /// Number of words shared by consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 0,
        }
    }
}

impl ChunkingConfig {
    /// Settings used for ad-hoc uploaded text, which is split into smaller
    /// overlapping sections than dataset abstracts
    #[inline]
    pub const fn upload() -> Self {
        Self {
            chunk_size: 300,
            overlap: 20,
        }
    }

    /// Distance in words between the starts of consecutive chunks
    #[inline]
    pub const fn stride(&self) -> usize {
        let size = if self.chunk_size == 0 {
            1
        } else {
            self.chunk_size
        };
        if self.overlap >= size {
            1
        } else {
            size - self.overlap
        }
    }

    #[inline]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.chunk_size, self.overlap)
    }
}

/// Split text into windows of `size` words whose starts are `size - overlap`
/// words apart. The last window may be shorter.
#[inline]
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let config = ChunkingConfig {
        chunk_size: size,
        overlap,
    };
    let size = size.max(1);
    let stride = config.stride();

    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words.get(start..end).unwrap_or_default().join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }

    chunks
}

/// Count the words a chunk was built from
#[inline]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Derive a short human-readable title for a chunk
///
/// Prefers the first sentence with more than three words, falling back to the
/// leading words of the chunk.
#[inline]
pub fn chunk_title(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < TITLE_MIN_WORDS {
        return format!("{}...", truncate_chars(text, TITLE_MAX_CHARS));
    }

    let first_sentence = text
        .split('.')
        .map(str::trim)
        .find(|sentence| word_count(sentence) > 3);

    if let Some(sentence) = first_sentence {
        let title = truncate_chars(sentence, TITLE_MAX_CHARS);
        return if title.len() < sentence.len() {
            format!("{}...", title)
        } else {
            title.to_string()
        };
    }

    let lead = words
        .get(..TITLE_FALLBACK_WORDS.min(words.len()))
        .unwrap_or_default()
        .join(" ");
    if words.len() > TITLE_FALLBACK_WORDS {
        format!("{}...", lead)
    } else {
        lead
    }
}

/// Take at most `max_chars` characters from the start of `text`
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text.get(..byte_index).unwrap_or(text),
        None => text,
    }
}
