//! Embedding capability.
//!
//! Defines the [`Embedder`] trait the indexing pipeline and query side
//! depend on, plus [`HttpEmbedder`], an OpenAI-compatible `/embeddings`
//! client with batching-friendly request bodies and exponential backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::EngineError;

/// Text-to-vector capability consumed by the engine.
///
/// `encode` must be deterministic for the same input and model version and
/// return one vector per input text, in input order. Vectors need not be
/// pre-normalized; the store normalizes on insert.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding dimensionality produced by this capability.
    fn dims(&self) -> usize;
}

/// OpenAI-compatible embeddings client.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
    api_key: String,
}

impl HttpEmbedder {
    /// Build the client, resolving the API key from the configured
    /// environment variable.
    ///
    /// A missing key is a [`EngineError::Configuration`] failure at
    /// construction; it never surfaces later as a per-request error.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EngineError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EngineError::Configuration(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embeddings_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("embeddings API error {status}: {body_text}"));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("embeddings API error {status}: {body_text}");
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("embedding failed after retries")))
    }

    fn dims(&self) -> usize {
        self.config.dims
    }
}

/// Extract `data[].embedding` arrays, which arrive in input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing embedding"))?;

        let mut vec = Vec::with_capacity(embedding.len());
        for v in embedding {
            let x = v.as_f64().ok_or_else(|| {
                anyhow::anyhow!("invalid embeddings response: non-numeric component")
            })?;
            vec.push(x as f32);
        }

        embeddings.push(vec);
    }

    Ok(embeddings)
}
