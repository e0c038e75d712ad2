//! Core data types used throughout the engine.
//!
//! These types represent the chunks, route decisions, and query results
//! that flow through indexing and per-question answering.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which document collection a chunk was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Doc,
    Pdf,
    Code,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Doc => "doc",
            SourceKind::Pdf => "pdf",
            SourceKind::Code => "code",
        }
    }
}

/// Provenance metadata attached to every chunk.
///
/// `id` is derived deterministically from the file name plus the sequence
/// index of the unit the reader emitted (pdf page, code block), never from
/// a content hash, so rebuilds of the same input reproduce the same ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub source_kind: SourceKind,
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub id: String,
}

/// A contiguous span of extracted text plus its source provenance.
/// Immutable once created by the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub meta: ChunkMeta,
}

impl Chunk {
    /// Identity used when fusing ranked lists: two chunks with the same
    /// key are the same piece of evidence.
    pub fn dedup_key(&self) -> (SourceKind, &str) {
        (self.meta.source_kind, self.meta.id.as_str())
    }
}

/// The evidence source(s) chosen for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Doc,
    Pdf,
    Code,
    Sql,
    Hybrid,
}

/// One step in a hybrid route's consultation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HybridStep {
    Sql,
    Doc,
    Pdf,
    Code,
}

impl HybridStep {
    /// Whether this step consults the vector index rather than the
    /// relational engine.
    pub fn is_retrieval(&self) -> bool {
        !matches!(self, HybridStep::Sql)
    }
}

/// The router's classification of a question, validated at the boundary.
///
/// Invariant (enforced by the router): `hybrid_order` is non-empty exactly
/// when `route` is [`Route::Hybrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: Route,
    #[serde(default)]
    pub hybrid_order: Vec<HybridStep>,
    #[serde(default)]
    pub reason: String,
}

/// Outcome of the structured-query path for one question.
///
/// Either `error` is set and `columns`/`rows` are empty, or `error` is
/// absent and every row has exactly `columns.len()` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlResult {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything the engine returns for one question.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub route: Route,
    pub reason: String,
    pub hybrid_order: Vec<HybridStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlResult>,
    pub citations: Vec<String>,
    pub answer: String,
}
