use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub server: ServerConfig,
}

/// Roots of the four document collections consulted by the engine.
#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub docs: PathBuf,
    pub pdfs: PathBuf,
    pub code: PathBuf,
    pub tables: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_code_chunk_size")]
    pub code_chunk_size: usize,
    #[serde(default = "default_code_overlap")]
    pub code_overlap: usize,
    #[serde(default = "default_max_chunks_per_file")]
    pub max_chunks_per_file: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            code_chunk_size: default_code_chunk_size(),
            code_overlap: default_code_overlap(),
            max_chunks_per_file: default_max_chunks_per_file(),
        }
    }
}

fn default_chunk_size() -> usize {
    900
}
fn default_overlap() -> usize {
    120
}
fn default_code_chunk_size() -> usize {
    800
}
fn default_code_overlap() -> usize {
    100
}
fn default_max_chunks_per_file() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Files larger than this (on disk) are skipped before reading.
    #[serde(default = "default_max_file_mb")]
    pub max_file_mb: u64,
    /// Plain/markup documents are truncated to this many chars after reading.
    #[serde(default = "default_max_doc_chars")]
    pub max_doc_chars: usize,
    /// Chunks per embedding-capability call.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_file_mb: default_max_file_mb(),
            max_doc_chars: default_max_doc_chars(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

fn default_max_file_mb() -> u64 {
    20
}
fn default_max_doc_chars() -> usize {
    2_000_000
}
fn default_embed_batch_size() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Default top-k for vector retrieval when the caller does not supply one.
    #[serde(default = "default_topk")]
    pub topk: usize,
    /// Small fixed top-k of unstructured grounding fetched on the sql route.
    #[serde(default = "default_sql_context_k")]
    pub sql_context_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            topk: default_topk(),
            sql_context_k: default_sql_context_k(),
        }
    }
}

fn default_topk() -> usize {
    6
}
fn default_sql_context_k() -> usize {
    3
}

/// Settings for the embedding capability (OpenAI-compatible `/embeddings`).
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    /// Environment variable holding the API key.
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            api_key_env: default_embedding_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Settings for the language-model capability (OpenAI-compatible
/// `/chat/completions`; the default base URL targets Groq).
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_llm_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }
    if config.chunking.code_overlap >= config.chunking.code_chunk_size {
        anyhow::bail!("chunking.code_overlap must be < chunking.code_chunk_size");
    }
    if config.chunking.max_chunks_per_file == 0 {
        anyhow::bail!("chunking.max_chunks_per_file must be > 0");
    }
    if config.indexing.embed_batch_size == 0 {
        anyhow::bail!("indexing.embed_batch_size must be > 0");
    }
    if config.retrieval.topk == 0 {
        anyhow::bail!("retrieval.topk must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.model.is_empty() || config.llm.model.is_empty() {
        anyhow::bail!("embedding.model and llm.model must be non-empty");
    }

    Ok(config)
}
