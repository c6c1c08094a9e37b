//! TOML configuration parsing and validation.
//!
//! Every section except `[search]` and `[server]` has defaults, so a minimal
//! file only needs to choose the backend and the bind address. See
//! [`load_config`] for the validation rules.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::MAX_RESULT_WINDOW;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub search: SearchConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub elasticsearch: Option<ElasticsearchConfig>,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// `"sqlite"` or `"elasticsearch"`.
    pub backend: String,
    #[serde(default = "default_index")]
    pub index: String,
}

fn default_index() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/docsearch.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Falls back to the `ELASTIC_PASSWORD` environment variable.
    #[serde(default)]
    pub password: Option<String>,
    /// PEM file with the cluster's HTTP CA certificate.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ElasticsearchConfig {
    pub fn resolved_password(&self) -> Option<String> {
        self.password
            .clone()
            .or_else(|| std::env::var("ELASTIC_PASSWORD").ok())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_lexical_boost")]
    pub lexical_boost: f64,
    #[serde(default = "default_vector_boost")]
    pub vector_boost: f64,
    #[serde(default = "default_num_candidates")]
    pub num_candidates: u32,
    #[serde(default = "default_interactive_k")]
    pub interactive_k: u32,
    #[serde(default = "default_page_size")]
    pub interactive_page_size: u32,
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,
    /// Optional cap applied to caller-supplied `top_k`.
    #[serde(default)]
    pub max_top_k: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_boost: default_lexical_boost(),
            vector_boost: default_vector_boost(),
            num_candidates: default_num_candidates(),
            interactive_k: default_interactive_k(),
            interactive_page_size: default_page_size(),
            default_top_k: default_top_k(),
            max_top_k: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_lexical_boost() -> f64 {
    0.7
}
fn default_vector_boost() -> f64 {
    0.3
}
fn default_num_candidates() -> u32 {
    50
}
fn default_interactive_k() -> u32 {
    10
}
fn default_page_size() -> u32 {
    5
}
fn default_top_k() -> u32 {
    10
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    /// Per-document content cap, in characters. `None` inlines full content.
    #[serde(default)]
    pub max_document_chars: Option<usize>,
    /// Number of retrieved documents used to ground a chat answer.
    #[serde(default = "default_context_documents")]
    pub context_documents: u32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_document_chars: None,
            context_documents: default_context_documents(),
        }
    }
}

fn default_context_documents() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Config {
    /// A config with the SQLite backend and every provider disabled.
    pub fn minimal() -> Self {
        Self {
            search: SearchConfig {
                backend: "sqlite".to_string(),
                index: default_index(),
            },
            db: DbConfig::default(),
            elasticsearch: None,
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            prompt: PromptConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:8000".to_string(),
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.search.backend.as_str() {
        "sqlite" => {}
        "elasticsearch" => {
            if config.elasticsearch.is_none() {
                anyhow::bail!("search.backend = 'elasticsearch' requires an [elasticsearch] section");
            }
        }
        other => anyhow::bail!(
            "Unknown search backend: '{}'. Must be sqlite or elasticsearch.",
            other
        ),
    }

    if config.search.index.trim().is_empty() {
        anyhow::bail!("search.index must not be empty");
    }

    let r = &config.retrieval;
    if !(0.0..=1.0).contains(&r.lexical_boost) {
        anyhow::bail!("retrieval.lexical_boost must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&r.vector_boost) {
        anyhow::bail!("retrieval.vector_boost must be in [0.0, 1.0]");
    }
    if r.num_candidates < 1 || r.num_candidates > MAX_RESULT_WINDOW {
        anyhow::bail!(
            "retrieval.num_candidates must be between 1 and {}",
            MAX_RESULT_WINDOW
        );
    }
    if r.interactive_k < 1 || r.interactive_page_size < 1 || r.default_top_k < 1 {
        anyhow::bail!("retrieval.interactive_k, interactive_page_size and default_top_k must be >= 1");
    }
    if r.num_candidates < r.interactive_k {
        anyhow::bail!("retrieval.num_candidates must be >= retrieval.interactive_k");
    }
    if r.max_top_k == Some(0) {
        anyhow::bail!("retrieval.max_top_k must be >= 1 when set");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" | "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, ollama, or openai.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "ollama" | "openai") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.generation.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }

    if config.prompt.context_documents < 1 {
        anyhow::bail!("prompt.context_documents must be >= 1");
    }
    if config.prompt.max_document_chars == Some(0) {
        anyhow::bail!("prompt.max_document_chars must be >= 1 when set");
    }

    Ok(())
}
