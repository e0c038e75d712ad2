//! Indexing pipeline and query-side entry to the dense store.
//!
//! `build` walks the three document collections once at startup, drives
//! the per-kind readers and the chunker, embeds chunks in bounded batches,
//! and appends each embedded batch to the store together with its
//! payloads. The build is sequential and non-resumable; a changed corpus
//! requires a full rebuild. After `build` returns the store is read-only,
//! so concurrent query-time reads need no locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::models::Chunk;
use crate::readers;
use crate::store::DenseStore;

pub struct VectorIndex {
    store: DenseStore,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store: DenseStore::new(),
            embedder,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Walk the doc, pdf, and code roots and populate the store.
    ///
    /// Oversized and unreadable files are logged and skipped, never fatal.
    /// Embedding-capability failures abort the build; this runs before the
    /// engine accepts queries, so a partial index is never served.
    pub async fn build(&mut self, config: &Config) -> Result<()> {
        let max_mb = config.indexing.max_file_mb;

        for path in collect_files(&config.data.docs, readers::TEXT_EXTENSIONS) {
            if readers::file_too_large(&path, max_mb) {
                warn!(file = %path.display(), "skipping oversized file");
                continue;
            }
            match readers::read_doc(&path, &config.chunking, &config.indexing) {
                Ok(chunks) => self.add_batched(chunks, config.indexing.embed_batch_size).await?,
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable doc"),
            }
        }

        for path in collect_files(&config.data.pdfs, readers::PDF_EXTENSIONS) {
            if readers::file_too_large(&path, max_mb) {
                warn!(file = %path.display(), "skipping oversized file");
                continue;
            }
            match readers::read_pdf(&path, &config.chunking) {
                Ok(chunks) => self.add_batched(chunks, config.indexing.embed_batch_size).await?,
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable pdf"),
            }
        }

        for path in collect_files(&config.data.code, readers::CODE_EXTENSIONS) {
            if readers::file_too_large(&path, max_mb) {
                warn!(file = %path.display(), "skipping oversized file");
                continue;
            }
            match readers::read_code(&path, &config.chunking) {
                Ok(chunks) => self.add_batched(chunks, config.indexing.embed_batch_size).await?,
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable code"),
            }
        }

        info!(entries = self.store.len(), "index build complete");
        Ok(())
    }

    /// Embed `chunks` in bounded batches and append each batch atomically:
    /// a store that has seen N vectors always holds exactly N payloads.
    async fn add_batched(&mut self, chunks: Vec<Chunk>, batch_size: usize) -> Result<()> {
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.encode(&texts).await?;
            debug!(batch = batch.len(), "embedded batch");
            self.store.add(vectors, batch.to_vec());
        }
        Ok(())
    }

    /// Embed the question and return the `topk` nearest chunks.
    pub async fn search(&self, question: &str, topk: usize) -> Result<Vec<(f32, Chunk)>> {
        let vectors = self.embedder.encode(&[question.to_string()]).await?;
        let query = vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response for query"))?;
        Ok(self.store.search(&query, topk))
    }
}

/// Recursively collect files under `root` whose extension is in the
/// allow-list, in a deterministic (sorted) order. A missing root is
/// treated as an empty collection.
fn collect_files(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if !root.exists() {
        warn!(root = %root.display(), "collection root does not exist, skipping");
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .map(|ext| extensions.contains(&ext.as_str()))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}
