//! Per-question orchestration: route, gather evidence, synthesize.
//!
//! `Engine::ask` is the single entry point used by both the CLI and the
//! HTTP surface. It asks the router where the evidence lives, runs the
//! structured and/or unstructured paths accordingly, renders everything
//! into one numbered evidence bundle, and hands that to the language
//! model for the final grounded answer.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::RetrievalConfig;
use crate::error::EngineError;
use crate::index::VectorIndex;
use crate::llm::ChatModel;
use crate::models::{AskResponse, Chunk, ChunkMeta, Route, SourceKind, SqlResult};
use crate::router::Router;
use crate::sql::SqlEngine;

const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are a precise analyst. Answer using ONLY the provided evidence.
Cite sources in brackets like [1], [2] matching the provided snippet numbers.
Use exact numbers from SQL results when present.
If the evidence is insufficient, say so explicitly.";

const SYNTHESIS_TEMPERATURE: f32 = 0.1;

/// How many result rows the evidence bundle shows the model.
const SQL_DISPLAY_ROWS: usize = 10;

pub struct Engine {
    index: VectorIndex,
    sql: SqlEngine,
    router: Router,
    llm: Arc<dyn ChatModel>,
    retrieval: RetrievalConfig,
}

impl Engine {
    pub fn new(
        index: VectorIndex,
        sql: SqlEngine,
        router: Router,
        llm: Arc<dyn ChatModel>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            sql,
            router,
            llm,
            retrieval,
        }
    }

    pub fn sql_engine(&self) -> &SqlEngine {
        &self.sql
    }

    /// Answer one question end to end.
    ///
    /// Route dispatch:
    /// - `sql`: run the structured path, plus a small fixed-k unstructured
    ///   context so the model can ground terminology.
    /// - `doc` / `pdf` / `code`: vector search only.
    /// - `hybrid`: walk `hybrid_order`; sql steps re-run the structured
    ///   path, the first retrieval step performs the search and later
    ///   retrieval steps are no-ops.
    pub async fn ask(&self, question: &str, topk: Option<usize>) -> Result<AskResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::Validation("question must not be empty".to_string()).into());
        }
        let topk = topk.unwrap_or(self.retrieval.topk);

        let decision = self.router.decide(question).await?;
        info!(route = ?decision.route, reason = %decision.reason, "routed question");

        let mut sql_result: Option<SqlResult> = None;
        let mut hits: Vec<(f32, Chunk)> = Vec::new();

        match decision.route {
            Route::Sql => {
                sql_result = Some(self.sql.query(question).await?);
                hits = self
                    .index
                    .search(question, self.retrieval.sql_context_k)
                    .await?;
            }
            Route::Doc | Route::Pdf | Route::Code => {
                hits = self.index.search(question, topk).await?;
            }
            Route::Hybrid => {
                for step in &decision.hybrid_order {
                    if step.is_retrieval() {
                        if hits.is_empty() {
                            hits = self.index.search(question, topk).await?;
                        }
                    } else {
                        sql_result = Some(self.sql.query(question).await?);
                    }
                }
            }
        }

        let citations: Vec<String> = hits
            .iter()
            .map(|(_, chunk)| citation_label(&chunk.meta))
            .collect();

        let evidence = render_evidence(&hits, sql_result.as_ref());
        let user = format!("Question: {question}\n\nEvidence:\n{evidence}\n\nAnswer:");
        let answer = self
            .llm
            .complete(SYNTHESIS_SYSTEM_PROMPT, &user, SYNTHESIS_TEMPERATURE)
            .await?;

        Ok(AskResponse {
            route: decision.route,
            reason: decision.reason,
            hybrid_order: decision.hybrid_order,
            sql: sql_result,
            citations,
            answer,
        })
    }
}

/// Human-readable provenance label, basename only: `report.md`,
/// `paper.pdf p.3`, `engine.rs:block_2`.
pub fn citation_label(meta: &ChunkMeta) -> String {
    let name = meta
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| meta.file.display().to_string());
    match meta.source_kind {
        SourceKind::Doc => name,
        SourceKind::Pdf => match meta.page {
            Some(page) => format!("{name} p.{page}"),
            None => name,
        },
        SourceKind::Code => match &meta.symbol {
            Some(symbol) => format!("{name}:{symbol}"),
            None => name,
        },
    }
}

/// Render retrieved snippets and the SQL outcome into one numbered bundle.
fn render_evidence(hits: &[(f32, Chunk)], sql: Option<&SqlResult>) -> String {
    let mut sections = Vec::new();

    for (i, (_, chunk)) in hits.iter().enumerate() {
        sections.push(format!(
            "[{}] ({})\n{}",
            i + 1,
            citation_label(&chunk.meta),
            chunk.text
        ));
    }

    if let Some(result) = sql {
        sections.push(render_sql_block(result));
    }

    if sections.is_empty() {
        "No evidence found.".to_string()
    } else {
        sections.join("\n\n")
    }
}

fn render_sql_block(result: &SqlResult) -> String {
    let mut block = format!("SQL QUERY:\n{}", result.sql);
    if let Some(error) = &result.error {
        block.push_str(&format!("\nERROR: {error}"));
        return block;
    }

    block.push_str(&format!("\nRESULTS (first {SQL_DISPLAY_ROWS}):"));
    block.push_str(&format!("\n{}", result.columns.join(" | ")));
    for row in result.rows.iter().take(SQL_DISPLAY_ROWS) {
        let cells: Vec<String> = row.iter().map(render_cell).collect();
        block.push_str(&format!("\n{}", cells.join(" | ")));
    }
    block
}

fn render_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta(kind: SourceKind, file: &str, page: Option<u32>, symbol: Option<&str>) -> ChunkMeta {
        ChunkMeta {
            source_kind: kind,
            file: PathBuf::from(file),
            page,
            symbol: symbol.map(str::to_string),
            id: file.to_string(),
        }
    }

    #[test]
    fn test_citation_labels_per_kind() {
        assert_eq!(
            citation_label(&meta(SourceKind::Doc, "/data/docs/report.md", None, None)),
            "report.md"
        );
        assert_eq!(
            citation_label(&meta(SourceKind::Pdf, "/data/pdfs/paper.pdf", Some(3), None)),
            "paper.pdf p.3"
        );
        assert_eq!(
            citation_label(&meta(
                SourceKind::Code,
                "/data/code/engine.rs",
                None,
                Some("block_2")
            )),
            "engine.rs:block_2"
        );
    }

    #[test]
    fn test_render_evidence_numbers_snippets() {
        let hits = vec![
            (
                0.9,
                Chunk {
                    text: "Revenue grew 10%".to_string(),
                    meta: meta(SourceKind::Doc, "a.md", None, None),
                },
            ),
            (
                0.5,
                Chunk {
                    text: "Costs were flat".to_string(),
                    meta: meta(SourceKind::Doc, "b.md", None, None),
                },
            ),
        ];
        let rendered = render_evidence(&hits, None);
        assert!(rendered.starts_with("[1] (a.md)\nRevenue grew 10%"));
        assert!(rendered.contains("[2] (b.md)\nCosts were flat"));
    }

    #[test]
    fn test_render_evidence_empty() {
        assert_eq!(render_evidence(&[], None), "No evidence found.");
    }

    #[test]
    fn test_render_sql_block_caps_rows() {
        let result = SqlResult {
            sql: "SELECT region, units FROM sales".to_string(),
            columns: vec!["region".to_string(), "units".to_string()],
            rows: (0..12)
                .map(|i| vec![serde_json::json!("west"), serde_json::json!(i)])
                .collect(),
            error: None,
        };
        let block = render_sql_block(&result);
        assert!(block.contains("RESULTS (first 10):"));
        assert!(block.contains("region | units"));
        assert!(block.contains("west | 9"));
        assert!(!block.contains("west | 10"));
        assert!(!block.contains("west | 11"));
    }

    #[test]
    fn test_render_sql_block_shows_error() {
        let result = SqlResult {
            sql: "SELECT * FROM missing".to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            error: Some("no such table: missing".to_string()),
        };
        let block = render_sql_block(&result);
        assert!(block.contains("ERROR: no such table: missing"));
        assert!(!block.contains("RESULTS"));
    }
}
