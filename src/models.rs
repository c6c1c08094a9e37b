//! Core data models used throughout docsearch.
//!
//! These types represent the documents, queries, and ranked hits that flow
//! through the ingestion, retrieval, and chat paths.

use serde::{Deserialize, Serialize};

/// A unit of knowledge as supplied by callers and returned by the read path.
///
/// The embedding derived from `summary` is attached only on the write side
/// (see [`IndexedDocument`]) and is never part of this view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(
        default,
        rename = "rolePermissions",
        alias = "role_permissions",
        skip_serializing_if = "Option::is_none"
    )]
    pub role_permissions: Option<Vec<String>>,
}

impl Document {
    /// Text used as the embedding source. Absent summaries embed as `""`.
    pub fn embedding_source(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }
}

/// Write-side payload: a document plus the vector computed from its summary.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// Opaque identifier assigned by the search engine at insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    pub id: String,
}

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A persisted document together with its engine-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    #[serde(flatten)]
    pub document: Document,
}

/// Structured search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<u32>,
}

/// Interactive (paginated) search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageQuery {
    pub query: String,
    #[serde(default, rename = "from_", alias = "from")]
    pub from: u32,
}

/// One entry of a retrieval result.
///
/// `blended_score` is the engine-reported combination of the weighted
/// lexical and vector sub-scores. The sub-scores are present only when the
/// engine reports them separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub id: String,
    pub document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f64>,
    pub blended_score: f64,
}

/// A page of interactive search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub query: String,
    pub hits: Vec<RankedHit>,
    /// Total matches reported by the engine, across all pages.
    pub total: u64,
    #[serde(rename = "from_")]
    pub from: u32,
    pub size: u32,
}

/// A natural-language question for the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatQuestion {
    pub question: String,
}

/// The generated answer plus the documents it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<RankedHit>,
}
