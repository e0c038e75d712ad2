//! Per-kind text extraction: plain/markup documents, PDFs, and source code.
//!
//! Each reader turns one file into a stream of [`Chunk`]s tagged with
//! provenance metadata. Readers never panic on malformed input; extraction
//! failures bubble up as errors and the indexing pipeline skips the file.
//!
//! The size ceiling ([`file_too_large`]) is checked against on-disk size
//! before a file is read at all; the per-document character truncation is
//! a separate bound applied after reading.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::chunk::{attach_meta, chunk_text};
use crate::config::{ChunkingConfig, IndexingConfig};
use crate::models::{Chunk, ChunkMeta, SourceKind};

/// Extensions indexed as plain/markup documents.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "html", "htm"];
/// Extensions indexed as PDFs.
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
/// Extensions indexed as source code.
pub const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "java", "go", "cpp", "c", "cs", "php", "rb",
];

const MARKUP_EXTENSIONS: &[&str] = &["html", "htm"];

/// Lines that look like they open a function/class/brace-delimited block.
/// Heuristic, language-agnostic; not a parser.
static BLOCK_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z_].{0,120}\{|\s*def\s|\s*class\s)").expect("block-start pattern")
});

/// True when the file's on-disk size exceeds the configured ceiling.
/// Unreadable metadata counts as not-too-large; the subsequent read will
/// fail and the file gets skipped there instead.
pub fn file_too_large(path: &Path, max_file_mb: u64) -> bool {
    std::fs::metadata(path)
        .map(|m| m.len() > max_file_mb * 1024 * 1024)
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn truncate_chars(s: String, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s,
    }
}

/// Read a plain-text or markup file into `doc` chunks.
///
/// Markup files are reduced to their visible text (script and style
/// content dropped) before chunking; the result is truncated to the
/// configured character budget.
pub fn read_doc(
    path: &Path,
    chunking: &ChunkingConfig,
    indexing: &IndexingConfig,
) -> Result<Vec<Chunk>> {
    let raw = read_lossy(path)?;

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let text = if MARKUP_EXTENSIONS.contains(&ext.as_str()) {
        visible_text(&raw)
    } else {
        raw
    };
    let text = truncate_chars(text, indexing.max_doc_chars);

    let meta = ChunkMeta {
        source_kind: SourceKind::Doc,
        file: path.to_path_buf(),
        page: None,
        symbol: None,
        id: file_name(path),
    };
    Ok(attach_meta(
        chunk_text(
            &text,
            chunking.chunk_size,
            chunking.overlap,
            chunking.max_chunks_per_file,
        ),
        &meta,
    ))
}

/// Read a PDF into `pdf` chunks, one chunk stream per page.
///
/// Pages are chunked independently so windows never span a page boundary
/// and the 1-based `page` citation metadata stays exact.
pub fn read_pdf(path: &Path, chunking: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .with_context(|| format!("PDF extraction failed for {}", path.display()))?;

    let name = file_name(path);
    let mut chunks = Vec::new();
    for (i, page_text) in pages.iter().enumerate() {
        let page_no = (i + 1) as u32;
        let meta = ChunkMeta {
            source_kind: SourceKind::Pdf,
            file: path.to_path_buf(),
            page: Some(page_no),
            symbol: None,
            id: format!("{name}#p{page_no}"),
        };
        chunks.extend(attach_meta(
            chunk_text(
                page_text,
                chunking.chunk_size,
                chunking.overlap,
                chunking.max_chunks_per_file,
            ),
            &meta,
        ));
    }
    Ok(chunks)
}

/// Read a source file into `code` chunks.
///
/// The file is split on heuristic block boundaries; each block gets a
/// synthetic `block_<n>` symbol (true symbol names are not parsed) and is
/// sub-chunked through the general chunker if oversized.
pub fn read_code(path: &Path, chunking: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let raw = read_lossy(path)?;
    let name = file_name(path);

    let mut chunks = Vec::new();
    for (i, block) in split_blocks(&raw).into_iter().enumerate() {
        let snippet = block.trim();
        if snippet.is_empty() {
            continue;
        }
        let meta = ChunkMeta {
            source_kind: SourceKind::Code,
            file: path.to_path_buf(),
            page: None,
            symbol: Some(format!("block_{i}")),
            id: format!("{name}#b{i}"),
        };
        chunks.extend(attach_meta(
            chunk_text(
                snippet,
                chunking.code_chunk_size,
                chunking.code_overlap,
                chunking.max_chunks_per_file,
            ),
            &meta,
        ));
    }
    Ok(chunks)
}

/// Split source text on lines that open a new block. Blocks keep their
/// original line content; a file with no recognizable block starts comes
/// back as a single block.
fn split_blocks(raw: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in raw.lines() {
        if BLOCK_START.is_match(line) && !current.trim().is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Extract the visible text of an HTML document, dropping script, style,
/// and similar non-rendered content. Text nodes are newline-separated.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    collect_text(document.root_element(), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(t) => {
                let piece = t.trim();
                if !piece.is_empty() {
                    out.push_str(piece);
                    out.push('\n');
                }
            }
            Node::Element(e) => {
                if matches!(e.name(), "script" | "style" | "noscript" | "template") {
                    continue;
                }
                if let Some(el) = ElementRef::wrap(child) {
                    collect_text(el, out);
                }
            }
            _ => {}
        }
    }
}
