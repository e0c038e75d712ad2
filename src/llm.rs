//! Language-model capability.
//!
//! Defines the [`ChatModel`] trait consumed by the router, the SQL
//! synthesizer, and final answer synthesis, plus [`HttpChatModel`], an
//! OpenAI-compatible `/chat/completions` client. The default configuration
//! targets Groq's OpenAI-compatible endpoint; any provider speaking the
//! same wire format works via `llm.base_url`.
//!
//! Retries follow the same ladder as the embeddings client: 429/5xx and
//! network errors back off and retry, other 4xx fail immediately.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::EngineError;

/// Free-text completion capability: one system instruction, one user
/// instruction, a sampling temperature, one string back.
///
/// Structured replies are the caller's concern; see
/// [`crate::router::Router`] for the validated structured-reply path.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct HttpChatModel {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl HttpChatModel {
    /// Build the client, resolving the API key from the configured
    /// environment variable. Missing key is fatal at construction.
    pub fn new(config: &LlmConfig) -> Result<Self, EngineError> {
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
impl ChatModel for HttpChatModel {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model,
            temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

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
                        let parsed: ChatResponse = response.json().await?;
                        let content = parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message.content)
                            .unwrap_or_default();
                        return Ok(content.trim().to_string());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("chat API error {status}: {body_text}"));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("chat API error {status}: {body_text}");
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("chat completion failed after retries")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = LlmConfig {
            api_key_env: "EVQ_TEST_NO_SUCH_CHAT_KEY".to_string(),
            ..LlmConfig::default()
        };
        match HttpChatModel::new(&config) {
            Err(EngineError::Configuration(msg)) => {
                assert!(msg.contains("EVQ_TEST_NO_SUCH_CHAT_KEY"));
            }
            Err(other) => panic!("expected a configuration error, got: {other}"),
            Ok(_) => panic!("construction must fail without the key"),
        }
    }

    #[test]
    fn test_chat_request_serializes_messages_in_order() {
        let body = ChatRequest {
            model: "m",
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
    }
}
