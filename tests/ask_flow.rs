//! End-to-end flows through the library API with mock capabilities.
//!
//! Exercises the full pipeline — reading, chunking, embedding, routing,
//! SQL synthesis, and answer synthesis — with deterministic in-process
//! stand-ins for the embedding and language-model capabilities, so no
//! network access or API keys are needed.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use evidence_engine::answer::Engine;
use evidence_engine::config::Config;
use evidence_engine::embedding::Embedder;
use evidence_engine::index::VectorIndex;
use evidence_engine::llm::ChatModel;
use evidence_engine::models::Route;
use evidence_engine::router::Router;
use evidence_engine::sql::SqlEngine;

/// Deterministic embedder: a small vector derived from byte counts, enough
/// for exact search over a handful of chunks.
struct ByteSumEmbedder;

#[async_trait]
impl Embedder for ByteSumEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let sum: u32 = t.bytes().map(u32::from).sum();
                vec![(sum % 97) as f32 + 1.0, (sum % 31) as f32 + 1.0, 1.0]
            })
            .collect())
    }

    fn dims(&self) -> usize {
        3
    }
}

/// Chat model scripted per role: replies are selected by which system
/// prompt arrives (routing, SQL synthesis, or final synthesis).
struct ScriptedChat {
    route_reply: String,
    sql_reply: String,
    answer_reply: String,
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, system: &str, _user: &str, _temperature: f32) -> Result<String> {
        if system.contains("routing classifier") {
            Ok(self.route_reply.clone())
        } else if system.contains("ANSI SQL") {
            Ok(self.sql_reply.clone())
        } else {
            Ok(self.answer_reply.clone())
        }
    }
}

fn test_config(root: &Path) -> Config {
    let body = format!(
        r#"
[data]
docs = "{0}/docs"
pdfs = "{0}/pdfs"
code = "{0}/code"
tables = "{0}/tables"

[server]
bind = "127.0.0.1:0"
"#,
        root.display()
    );
    toml::from_str(&body).unwrap()
}

async fn build_engine(config: &Config, chat: ScriptedChat) -> Engine {
    let llm: Arc<dyn ChatModel> = Arc::new(chat);

    let mut index = VectorIndex::new(Arc::new(ByteSumEmbedder));
    index.build(config).await.unwrap();

    let sql = SqlEngine::connect_in_memory(llm.clone()).await.unwrap();
    sql.ingest_csv_dir(&config.data.tables).await.unwrap();

    Engine::new(
        index,
        sql,
        Router::new(llm.clone()),
        llm,
        config.retrieval.clone(),
    )
}

#[tokio::test]
async fn test_doc_route_cites_the_retrieved_file() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("a.md"), "Revenue grew 10%").unwrap();

    let config = test_config(dir.path());
    let engine = build_engine(
        &config,
        ScriptedChat {
            route_reply: r#"{"route":"doc","hybrid_order":[],"reason":"general docs"}"#.into(),
            sql_reply: "SELECT 1".into(),
            answer_reply: "Revenue grew 10% [1].".into(),
        },
    )
    .await;

    let response = engine.ask("How did revenue change?", Some(1)).await.unwrap();

    assert_eq!(response.route, Route::Doc);
    assert_eq!(response.citations, vec!["a.md".to_string()]);
    assert_eq!(response.answer, "Revenue grew 10% [1].");
    assert!(response.sql.is_none());
    assert!(response.hybrid_order.is_empty());
}

#[tokio::test]
async fn test_sql_route_returns_rows_and_context() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    let tables = dir.path().join("tables");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::create_dir_all(&tables).unwrap();
    std::fs::write(docs.join("notes.md"), "Units are counted per shipment.").unwrap();
    std::fs::write(
        tables.join("sales.csv"),
        "region,units\nwest,10\neast,20\n",
    )
    .unwrap();

    let config = test_config(dir.path());
    let engine = build_engine(
        &config,
        ScriptedChat {
            route_reply: r#"{"route":"sql","hybrid_order":[],"reason":"aggregate"}"#.into(),
            sql_reply: "SELECT region, units FROM sales ORDER BY units DESC".into(),
            answer_reply: "East sold the most units: 20.".into(),
        },
    )
    .await;

    let response = engine.ask("Which region sold the most units?", None).await.unwrap();

    assert_eq!(response.route, Route::Sql);
    let sql = response.sql.expect("sql route must carry a SqlResult");
    assert!(sql.error.is_none());
    assert_eq!(sql.columns, vec!["region".to_string(), "units".to_string()]);
    assert_eq!(sql.rows[0][0], serde_json::json!("east"));
    assert_eq!(sql.rows[0][1], serde_json::json!(20));
    // sql route still grounds with a small unstructured context
    assert_eq!(response.citations, vec!["notes.md".to_string()]);
}

#[tokio::test]
async fn test_hybrid_route_carries_both_evidence_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    let tables = dir.path().join("tables");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::create_dir_all(&tables).unwrap();
    std::fs::write(docs.join("policy.md"), "Discounts apply to the west region.").unwrap();
    std::fs::write(tables.join("sales.csv"), "region,units\nwest,10\n").unwrap();

    let config = test_config(dir.path());
    let engine = build_engine(
        &config,
        ScriptedChat {
            route_reply:
                r#"{"route":"hybrid","hybrid_order":["sql","doc"],"reason":"needs both"}"#.into(),
            sql_reply: "SELECT units FROM sales WHERE region = 'west'".into(),
            answer_reply: "West sold 10 units [1]; discounts applied.".into(),
        },
    )
    .await;

    let response = engine
        .ask("How many units did the discounted region sell?", None)
        .await
        .unwrap();

    assert_eq!(response.route, Route::Hybrid);
    assert_eq!(response.hybrid_order.len(), 2);
    let sql = response.sql.expect("hybrid with a sql step carries a SqlResult");
    assert_eq!(sql.rows, vec![vec![serde_json::json!(10)]]);
    assert_eq!(response.citations, vec!["policy.md".to_string()]);
}

#[tokio::test]
async fn test_empty_question_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let engine = build_engine(
        &config,
        ScriptedChat {
            route_reply: r#"{"route":"doc","hybrid_order":[],"reason":""}"#.into(),
            sql_reply: "SELECT 1".into(),
            answer_reply: "unused".into(),
        },
    )
    .await;

    let err = engine.ask("   ", None).await.unwrap_err();
    assert!(err.to_string().contains("must not be empty"));
}

#[tokio::test]
async fn test_undecodable_routing_reply_fails_the_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let engine = build_engine(
        &config,
        ScriptedChat {
            route_reply: "I think you should check the docs.".into(),
            sql_reply: "SELECT 1".into(),
            answer_reply: "unused".into(),
        },
    )
    .await;

    let err = engine.ask("anything", None).await.unwrap_err();
    assert!(err.to_string().contains("could not be decoded"));
}
