//! SQLite backend: FTS5 for lexical scoring, brute-force cosine for vectors.
//!
//! The database file is the index. `create_index` lays down three tables:
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `documents` | document fields plus the summary embedding as a little-endian f32 BLOB |
//! | `documents_fts` | FTS5 over `name`, `summary`, `content` |
//! | `index_meta` | vector dimensionality |
//!
//! SQLite has no native score fusion, so [`SearchEngine::query`] recomputes
//! the blend itself:
//!
//! 1. Lexical candidates: every FTS5 match (terms OR-ed, like `multi_match`),
//!    BM25 rank min-max normalized to `[0, 1]`.
//! 2. Vector candidates: cosine similarity against every stored vector,
//!    mapped to `[0, 1]` as `(1 + cos) / 2`, best `min(k, num_candidates)` kept.
//! 3. `blended = lexical_boost * lexical + vector_boost * vector`, with a
//!    missing side contributing `0`.
//! 4. Sort by blended (desc) then id (asc), then apply `from`/`size`.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Connection, Row, Sqlite, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BulkItemStatus, EngineHit, EngineHits, HybridQuery, SearchEngine};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{GatewayError, Result};
use crate::models::{Document, DocumentId, IndexedDocument, StoredDocument};

pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    /// Open (creating if needed) the database file in WAL mode.
    pub async fn connect(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn index_exists(&self) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='documents'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn require_index(&self) -> Result<()> {
        if self.index_exists().await? {
            Ok(())
        } else {
            Err(GatewayError::engine(
                "index does not exist; run `docsearch init` or `docsearch reindex` first",
            ))
        }
    }

    async fn dims(&self) -> Result<Option<usize>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'dims'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    async fn fetch_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT content, summary, name, url, created_on, updated_at, category, role_permissions \
             FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_document(&r)).transpose()
    }

    async fn lexical_candidates(&self, text: &str) -> Result<Vec<(String, f64)>> {
        let Some(match_expr) = fts_match_expression(text) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT doc_id, bm25(documents_fts) AS rank
            FROM documents_fts
            WHERE documents_fts MATCH ?
            ORDER BY rank
            "#,
        )
        .bind(match_expr)
        .fetch_all(&self.pool)
        .await?;

        // bm25() is lower-is-better; negate so higher = better.
        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                (row.get("doc_id"), -rank)
            })
            .collect())
    }

    async fn vector_candidates(&self, query_vec: &[f32], keep: usize) -> Result<Vec<(String, f64)>> {
        let rows = sqlx::query("SELECT id, embedding FROM documents")
            .fetch_all(&self.pool)
            .await?;

        let mut candidates: Vec<(String, f64)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let cos = cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64;
                (row.get("id"), (1.0 + cos) / 2.0)
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        candidates.truncate(keep);
        Ok(candidates)
    }
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let permissions: Option<String> = row.get("role_permissions");
    let role_permissions = match permissions {
        Some(json) => Some(serde_json::from_str(&json).map_err(GatewayError::engine)?),
        None => None,
    };
    Ok(Document {
        content: row.get("content"),
        summary: row.get("summary"),
        name: row.get("name"),
        url: row.get("url"),
        created_on: row.get("created_on"),
        updated_at: row.get("updated_at"),
        category: row.get("category"),
        role_permissions,
    })
}

/// Turn free text into an FTS5 expression: each alphanumeric term quoted,
/// terms OR-ed. Returns `None` when the text has no searchable terms.
pub fn fts_match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(candidates: &[(String, f64)]) -> HashMap<&str, f64> {
    if candidates.is_empty() {
        return HashMap::new();
    }

    let s_min = candidates.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.1)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|(id, raw)| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (raw - s_min) / (s_max - s_min)
            };
            (id.as_str(), norm)
        })
        .collect()
}

/// A candidate after fusion, before the page window is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendedCandidate {
    pub id: String,
    pub lexical: Option<f64>,
    pub vector: Option<f64>,
    pub blended: f64,
}

/// Fuse normalized lexical scores and vector scores into one ranking.
pub fn blend(
    lexical: &HashMap<&str, f64>,
    vector: &HashMap<&str, f64>,
    lexical_boost: f64,
    vector_boost: f64,
) -> Vec<BlendedCandidate> {
    let mut ids: Vec<&str> = lexical.keys().chain(vector.keys()).copied().collect();
    ids.sort_unstable();
    ids.dedup();

    let mut fused: Vec<BlendedCandidate> = ids
        .into_iter()
        .map(|id| {
            let l = lexical.get(id).copied();
            let v = vector.get(id).copied();
            BlendedCandidate {
                id: id.to_string(),
                lexical: l,
                vector: v,
                blended: lexical_boost * l.unwrap_or(0.0) + vector_boost * v.unwrap_or(0.0),
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.blended
            .partial_cmp(&a.blended)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    fused
}

async fn insert_document(
    tx: &mut Transaction<'_, Sqlite>,
    doc: &IndexedDocument,
    dims: Option<usize>,
) -> Result<String> {
    if let Some(expected) = dims {
        if doc.embedding.len() != expected {
            return Err(GatewayError::engine(format!(
                "embedding has {} dimensions, index expects {}",
                doc.embedding.len(),
                expected
            )));
        }
    }

    let id = Uuid::new_v4().to_string();
    let d = &doc.document;
    let permissions = d
        .role_permissions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(GatewayError::engine)?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, content, summary, name, url, created_on, updated_at, category, role_permissions, embedding)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&d.content)
    .bind(&d.summary)
    .bind(&d.name)
    .bind(&d.url)
    .bind(&d.created_on)
    .bind(&d.updated_at)
    .bind(&d.category)
    .bind(&permissions)
    .bind(vec_to_blob(&doc.embedding))
    .execute(&mut **tx)
    .await?;

    sqlx::query("INSERT INTO documents_fts (doc_id, name, summary, content) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(d.name.as_deref().unwrap_or(""))
        .bind(d.summary.as_deref().unwrap_or(""))
        .bind(&d.content)
        .execute(&mut **tx)
        .await?;

    Ok(id)
}

#[async_trait]
impl SearchEngine for SqliteEngine {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn create_index(&self, dims: usize) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                summary TEXT,
                name TEXT,
                url TEXT,
                created_on TEXT,
                updated_at TEXT,
                category TEXT,
                role_permissions TEXT,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )
        .execute(&self.pool)
        .await?;

        // FTS5 CREATE is not idempotent natively, so we check first
        let fts_exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='documents_fts'",
        )
        .fetch_one(&self.pool)
        .await?;

        if !fts_exists {
            sqlx::query(
                r#"
                CREATE VIRTUAL TABLE documents_fts USING fts5(
                    doc_id UNINDEXED,
                    name,
                    summary,
                    content
                )
                "#,
            )
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            "INSERT INTO index_meta (key, value) VALUES ('dims', ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(dims.to_string())
        .execute(&self.pool)
        .await?;

        info!(dims, "sqlite index ready");
        Ok(())
    }

    async fn delete_index(&self, ignore_missing: bool) -> Result<()> {
        if !self.index_exists().await? {
            if ignore_missing {
                debug!("index did not exist, nothing to delete");
                return Ok(());
            }
            return Err(GatewayError::engine("index does not exist"));
        }

        let mut tx = self.pool.begin().await?;
        for table in ["documents_fts", "documents", "index_meta"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!("sqlite index deleted");
        Ok(())
    }

    async fn bulk_index(&self, docs: &[IndexedDocument]) -> Result<Vec<BulkItemStatus>> {
        self.require_index().await?;
        let dims = self.dims().await?;

        let mut tx = self.pool.begin().await?;
        let mut statuses = Vec::with_capacity(docs.len());
        for doc in docs {
            // One savepoint per item: a rejected item leaves no rows behind.
            let mut item = Connection::begin(&mut *tx).await?;
            match insert_document(&mut item, doc, dims).await {
                Ok(id) => {
                    item.commit().await?;
                    statuses.push(BulkItemStatus::Indexed { id });
                }
                Err(e) => {
                    item.rollback().await?;
                    statuses.push(BulkItemStatus::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }
        tx.commit().await?;

        Ok(statuses)
    }

    async fn index_one(&self, doc: &IndexedDocument) -> Result<DocumentId> {
        self.require_index().await?;
        let dims = self.dims().await?;

        let mut tx = self.pool.begin().await?;
        let id = insert_document(&mut tx, doc, dims).await?;
        tx.commit().await?;

        Ok(DocumentId::new(id))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<StoredDocument>> {
        self.require_index().await?;
        Ok(self.fetch_document(id).await?.map(|document| StoredDocument {
            id: id.to_string(),
            document,
        }))
    }

    async fn query(&self, query: &HybridQuery) -> Result<EngineHits> {
        self.require_index().await?;

        let lexical = self.lexical_candidates(&query.text).await?;
        let keep = query.k.min(query.num_candidates) as usize;
        let vector = self.vector_candidates(&query.query_vector, keep).await?;

        let norm_lexical = normalize_scores(&lexical);
        let vector_map: HashMap<&str, f64> =
            vector.iter().map(|(id, s)| (id.as_str(), *s)).collect();

        let fused = blend(
            &norm_lexical,
            &vector_map,
            query.lexical_boost,
            query.vector_boost,
        );
        debug!(
            lexical = lexical.len(),
            vector = vector.len(),
            fused = fused.len(),
            "sqlite hybrid candidates"
        );

        let total = fused.len() as u64;
        let mut hits = Vec::new();
        for cand in fused
            .into_iter()
            .skip(query.from as usize)
            .take(query.size as usize)
        {
            if let Some(document) = self.fetch_document(&cand.id).await? {
                hits.push(EngineHit {
                    id: cand.id,
                    document,
                    score: cand.blended,
                    lexical_score: cand.lexical,
                    vector_score: cand.vector,
                });
            }
        }

        Ok(EngineHits { total, hits })
    }
}
