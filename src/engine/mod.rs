//! Search engine abstraction.
//!
//! The [`SearchEngine`] trait is the narrow contract the retrieval pipeline
//! and the ingestion controller need from a document store that can run
//! lexical and approximate-nearest-neighbour queries. Two backends exist:
//!
//! | Backend | Module | Score fusion |
//! |---------|--------|--------------|
//! | Elasticsearch | [`elasticsearch`] | delegated: boosted `multi_match` + boosted `knn` in one request |
//! | SQLite | [`sqlite`] | recomputed: `LW * normalized BM25 + VW * cosine` |
//!
//! Implementations must be `Send + Sync`; they are constructed once and
//! shared across requests behind an `Arc`.

pub mod elasticsearch;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Document, DocumentId, IndexedDocument, StoredDocument};

/// Document fields matched by the lexical clause.
pub const LEXICAL_FIELDS: [&str; 3] = ["name", "summary", "content"];

/// Field holding the summary embedding.
pub const EMBEDDING_FIELD: &str = "embedding";

/// Deepest result a query may reach: `from + size`, `k` and
/// `num_candidates` all stay within it (Elasticsearch's
/// `index.max_result_window` and `knn` candidate limit).
pub const MAX_RESULT_WINDOW: u32 = 10_000;

/// One combined lexical + vector request.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    /// Free text for the lexical clause.
    pub text: String,
    /// Query embedding for the vector clause.
    pub query_vector: Vec<f32>,
    /// Weight applied to the lexical sub-score.
    pub lexical_boost: f64,
    /// Weight applied to the vector sub-score.
    pub vector_boost: f64,
    /// Nearest-neighbour candidates considered per shard.
    pub num_candidates: u32,
    /// Vector-side results kept after the ANN step.
    pub k: u32,
    /// Page size.
    pub size: u32,
    /// Page offset.
    pub from: u32,
}

/// A single scored hit as reported by the engine.
#[derive(Debug, Clone)]
pub struct EngineHit {
    pub id: String,
    pub document: Document,
    pub score: f64,
    pub lexical_score: Option<f64>,
    pub vector_score: Option<f64>,
}

/// A page of engine hits plus the total match count.
#[derive(Debug, Clone, Default)]
pub struct EngineHits {
    pub total: u64,
    pub hits: Vec<EngineHit>,
}

/// Per-item outcome of a bulk insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkItemStatus {
    Indexed { id: String },
    Failed { reason: String },
}

#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Backend name for logs (`"sqlite"`, `"elasticsearch"`).
    fn backend(&self) -> &str;

    /// Create the index with a dense vector field of `dims` dimensions.
    async fn create_index(&self, dims: usize) -> Result<()>;

    /// Drop the index. Missing indexes are an error unless `ignore_missing`.
    async fn delete_index(&self, ignore_missing: bool) -> Result<()>;

    /// Insert many documents, reporting each item's outcome in input order.
    async fn bulk_index(&self, docs: &[IndexedDocument]) -> Result<Vec<BulkItemStatus>>;

    /// Insert one document and return its assigned id.
    async fn index_one(&self, doc: &IndexedDocument) -> Result<DocumentId>;

    /// Fetch a document by id; `Ok(None)` when it does not exist.
    async fn get_by_id(&self, id: &str) -> Result<Option<StoredDocument>>;

    /// Run a combined lexical + vector query.
    ///
    /// Hits come back ordered by descending engine score.
    async fn query(&self, query: &HybridQuery) -> Result<EngineHits>;
}

/// Create the configured [`SearchEngine`] backend.
pub async fn create_engine(config: &Config) -> anyhow::Result<Arc<dyn SearchEngine>> {
    match config.search.backend.as_str() {
        "sqlite" => Ok(Arc::new(
            sqlite::SqliteEngine::connect(&config.db.path).await?,
        )),
        "elasticsearch" => {
            let es = config
                .elasticsearch
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("[elasticsearch] section missing"))?;
            Ok(Arc::new(elasticsearch::ElasticsearchEngine::new(
                es,
                &config.search.index,
            )?))
        }
        other => anyhow::bail!("Unknown search backend: {}", other),
    }
}

/// CLI entry: `docsearch init`.
pub async fn run_init(config: &Config) -> anyhow::Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!(
            "Creating an index requires an embedding provider. Set [embedding] provider in config."
        );
    }
    let embedder = crate::embedding::create_provider(&config.embedding)?;
    let engine = create_engine(config).await?;
    engine.create_index(embedder.dims()).await?;
    println!(
        "Index '{}' ready ({} backend, {} dims).",
        config.search.index,
        engine.backend(),
        embedder.dims()
    );
    Ok(())
}
