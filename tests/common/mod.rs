#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use docsearch::config::Config;
use docsearch::embedding::EmbeddingProvider;
use docsearch::engine::sqlite::SqliteEngine;
use docsearch::engine::SearchEngine;
use docsearch::error::{GatewayError, Result};
use docsearch::generation::GenerationProvider;
use docsearch::models::Document;
use docsearch::services::Services;

pub const DIMS: usize = 16;

/// Deterministic bag-of-words embedder: each lowercase term is hashed into
/// one of `DIMS` buckets.
pub struct HashEmbedder;

pub fn hash_embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.to_lowercase().bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        v[(h % DIMS as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }
}

/// Always fails, like an unreachable embedding service.
pub struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    fn model_name(&self) -> &str {
        "down"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(GatewayError::EmbeddingUnavailable(
            "connection refused".to_string(),
        ))
    }
}

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Because of the documents.\n\nSOURCES: Doc".to_string())
    }
}

pub struct DownGenerator;

#[async_trait]
impl GenerationProvider for DownGenerator {
    fn model_name(&self) -> &str {
        "down"
    }
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(GatewayError::GenerationUnavailable(
            "model not loaded".to_string(),
        ))
    }
}

pub struct Harness {
    pub tmp: TempDir,
    pub config: Config,
    pub engine: Arc<dyn SearchEngine>,
    pub generator: Arc<RecordingGenerator>,
    pub services: Services,
}

pub async fn harness() -> Harness {
    harness_with(Arc::new(HashEmbedder), None).await
}

pub async fn harness_with(
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Option<Arc<dyn GenerationProvider>>,
) -> Harness {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal();
    config.db.path = tmp.path().join("data").join("docsearch.sqlite");

    let engine: Arc<dyn SearchEngine> =
        Arc::new(SqliteEngine::connect(&config.db.path).await.unwrap());
    let recording = Arc::new(RecordingGenerator::default());
    let generator = generator.unwrap_or_else(|| recording.clone() as Arc<dyn GenerationProvider>);
    let services = Services::from_parts(&config, engine.clone(), embedder, generator);

    Harness {
        tmp,
        config,
        engine,
        generator: recording,
        services,
    }
}

pub fn doc(name: &str, summary: &str, content: &str) -> Document {
    Document {
        name: Some(name.to_string()),
        summary: Some(summary.to_string()),
        content: content.to_string(),
        ..Default::default()
    }
}

pub const CORPUS: &str = r#"[
  {"name": "Password Reset", "summary": "How to reset a forgotten password", "content": "Open settings.\nChoose reset password.\nFollow the email link.", "category": "account"},
  {"name": "Billing FAQ", "summary": "Invoices and payment methods", "content": "Invoices are sent monthly. Cards and bank transfers are accepted.", "category": "billing"},
  {"name": "Office Hours", "summary": "When the support desk is open", "content": "Support is open weekdays from nine to five.", "category": "support"}
]"#;

/// Write `CORPUS` to the harness temp dir and return its path.
pub fn write_corpus(h: &Harness) -> std::path::PathBuf {
    let path = h.tmp.path().join("documents.json");
    std::fs::write(&path, CORPUS).unwrap();
    path
}
