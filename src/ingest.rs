//! Document ingestion: single inserts and full index rebuilds.
//!
//! # Reindex flow
//!
//! ```text
//! JSON file ──parse──▶ Vec<Document> ──embed summaries──▶ Vec<IndexedDocument>
//!                                                              │
//!             delete index ◀── create index ◀──────────────────┘
//!                  │
//!                  └──▶ bulk insert ──▶ IngestReport
//! ```
//!
//! The file is parsed and every summary embedded before the index is
//! touched, so a malformed file or an unreachable embedder leaves the
//! current index in place. [`Ingestor::reindex`] never returns an error;
//! failures are logged and carried in the [`IngestReport`].

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::engine::{BulkItemStatus, SearchEngine};
use crate::error::{GatewayError, Result};
use crate::models::{Document, DocumentId, IndexedDocument};
use crate::services::Services;

const DEFAULT_BATCH_SIZE: usize = 64;

/// Outcome of a bulk (re)index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Items the engine reported a status for.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedItem>,
    /// Set when the run stopped before or during the bulk insert.
    pub error: Option<IngestError>,
}

impl IngestReport {
    fn aborted(err: &GatewayError) -> Self {
        Self {
            error: Some(IngestError {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem {
    /// Zero-based position in the input array.
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestError {
    pub code: String,
    pub message: String,
}

pub struct Ingestor {
    engine: Arc<dyn SearchEngine>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(engine: Arc<dyn SearchEngine>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            engine,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Number of summaries sent per embedding call during reindex.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed the document's summary and index it.
    pub async fn insert_document(&self, document: Document) -> Result<DocumentId> {
        let embedding = self.embedder.embed(document.embedding_source()).await?;
        let id = self
            .engine
            .index_one(&IndexedDocument {
                document,
                embedding,
            })
            .await?;
        info!(id = %id.id, "document inserted");
        Ok(id)
    }

    /// Drop the index and rebuild it from the JSON array at `path`.
    pub async fn reindex(&self, path: &Path) -> IngestReport {
        match self.try_reindex(path).await {
            Ok(report) => {
                info!(
                    processed = report.processed,
                    succeeded = report.succeeded,
                    failed = report.failed.len(),
                    "reindex complete"
                );
                report
            }
            Err(e) => {
                error!(path = %path.display(), code = e.code(), error = %e, "reindex failed");
                IngestReport::aborted(&e)
            }
        }
    }

    async fn try_reindex(&self, path: &Path) -> Result<IngestReport> {
        let documents = load_documents(path)?;
        info!(path = %path.display(), documents = documents.len(), "loaded ingestion file");

        let indexed = self.embed_all(documents).await?;
        let dims = indexed
            .first()
            .map(|d| d.embedding.len())
            .unwrap_or_else(|| self.embedder.dims());

        self.engine.delete_index(true).await?;
        self.engine.create_index(dims).await?;

        let statuses = self.engine.bulk_index(&indexed).await?;
        let mut report = IngestReport {
            processed: statuses.len(),
            ..Default::default()
        };
        for (position, status) in statuses.into_iter().enumerate() {
            match status {
                BulkItemStatus::Indexed { .. } => report.succeeded += 1,
                BulkItemStatus::Failed { reason } => {
                    warn!(position, reason = %reason, "document rejected by engine");
                    report.failed.push(FailedItem { position, reason });
                }
            }
        }
        Ok(report)
    }

    async fn embed_all(&self, documents: Vec<Document>) -> Result<Vec<IndexedDocument>> {
        let mut indexed = Vec::with_capacity(documents.len());
        for batch in documents.chunks(self.batch_size) {
            let texts: Vec<String> = batch
                .iter()
                .map(|d| d.embedding_source().to_string())
                .collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(GatewayError::embedding(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            indexed.extend(batch.iter().cloned().zip(vectors).map(|(document, embedding)| {
                IndexedDocument {
                    document,
                    embedding,
                }
            }));
        }
        Ok(indexed)
    }
}

/// Read a JSON array of documents. Every element must carry `summary` and
/// `content`.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::IngestionFormat(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_documents(&raw)
}

pub fn parse_documents(raw: &str) -> Result<Vec<Document>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| GatewayError::IngestionFormat(format!("invalid JSON: {}", e)))?;
    let items = value.as_array().ok_or_else(|| {
        GatewayError::IngestionFormat("expected a JSON array of documents".to_string())
    })?;

    items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            for field in ["summary", "content"] {
                if !item.get(field).is_some_and(|v| v.is_string()) {
                    return Err(GatewayError::IngestionFormat(format!(
                        "document {} is missing string field `{}`",
                        position, field
                    )));
                }
            }
            serde_json::from_value(item.clone()).map_err(|e| {
                GatewayError::IngestionFormat(format!("document {}: {}", position, e))
            })
        })
        .collect()
}

// ============ CLI ============

/// CLI entry: `docsearch reindex`.
pub async fn run_reindex(config: &Config, path: &Path) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let report = services.ingestor.reindex(path).await;

    if let Some(ref err) = report.error {
        anyhow::bail!("Reindex failed ({}): {}", err.code, err.message);
    }

    print!("{}", format_summary(&report));
    Ok(())
}

/// Human-readable summary of a completed reindex.
pub fn format_summary(report: &IngestReport) -> String {
    let mut out = format!(
        "Index regeneration completed. {} documents processed, {} added.\n",
        report.processed, report.succeeded
    );
    if !report.failed.is_empty() {
        out.push_str(&format!("  failed: {}\n", report.failed.len()));
        for item in &report.failed {
            out.push_str(&format!("    [{}] {}\n", item.position, item.reason));
        }
    }
    out
}

/// CLI entry: `docsearch add`.
pub async fn run_add(config: &Config, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let document: Document = serde_json::from_str(&raw)?;

    let services = Services::from_config(config).await?;
    let id = services.ingestor.insert_document(document).await?;
    println!("{}", id.id);
    Ok(())
}
