//! Sliding-window text chunker.
//!
//! Splits raw text into fixed-size, overlapping character windows. The
//! window count is hard-capped so an adversarially large input cannot
//! produce an unbounded chunk stream; the cap silently drops the
//! remainder rather than failing the file.

use crate::models::{Chunk, ChunkMeta};

/// Split `text` into windows of `chunk_size` characters, each overlapping
/// the previous by `overlap` characters. The final window may be shorter.
///
/// Surrounding whitespace is trimmed first; empty input yields no chunks.
/// If `overlap >= chunk_size` the advance step would not make progress,
/// so the next window starts at the end of the current one instead.
/// Production stops once `max_chunks` windows have been emitted.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize, max_chunks: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 || max_chunks == 0 {
        return Vec::new();
    }

    // Windows are measured in chars, not bytes, so a window boundary can
    // never land inside a multi-byte sequence.
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        if chunks.len() >= max_chunks {
            break;
        }
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = if overlap < chunk_size { end - overlap } else { end };
    }

    chunks
}

/// Pair each chunk string with a copy of `meta`.
///
/// The metadata is cloned per chunk: mutating one chunk's metadata later
/// must never affect its siblings.
pub fn attach_meta(chunks: Vec<String>, meta: &ChunkMeta) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|text| Chunk {
            text,
            meta: meta.clone(),
        })
        .collect()
}
