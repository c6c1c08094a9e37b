//! Elasticsearch backend.
//!
//! Talks to the cluster's REST API with `reqwest`. Score fusion is delegated
//! to Elasticsearch: the lexical `multi_match` and the `knn` clause each carry
//! a boost, and the engine sums the boosted sub-scores into `_score`. The
//! returned `_score` is used as-is and hit order is preserved.
//!
//! # Request shape
//!
//! ```json
//! {
//!   "query": { "bool": { "must": { "multi_match": {
//!       "query": "...", "fields": ["name", "summary", "content"], "boost": 0.7 } } } },
//!   "knn": { "field": "embedding", "query_vector": [...],
//!            "num_candidates": 50, "k": 10, "boost": 0.3 },
//!   "size": 5, "from": 0,
//!   "_source": { "excludes": ["embedding"] }
//! }
//! ```

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    BulkItemStatus, EngineHit, EngineHits, HybridQuery, SearchEngine, EMBEDDING_FIELD,
    LEXICAL_FIELDS,
};
use crate::config::ElasticsearchConfig;
use crate::error::{GatewayError, Result};
use crate::models::{Document, DocumentId, IndexedDocument, StoredDocument};

pub struct ElasticsearchEngine {
    client: reqwest::Client,
    base_url: Url,
    index: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchEngine {
    pub fn new(config: &ElasticsearchConfig, index: &str) -> anyhow::Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref ca_path) = config.ca_cert {
            let pem = std::fs::read(ca_path).map_err(|e| {
                anyhow::anyhow!("Failed to read CA certificate {}: {}", ca_path.display(), e)
            })?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        let base_url = Url::parse(&config.url)
            .map_err(|e| anyhow::anyhow!("Invalid elasticsearch.url '{}': {}", config.url, e))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid elasticsearch.url '{}': not an http(s) URL", config.url);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            index: index.to_string(),
            username: config.username.clone(),
            password: config.resolved_password(),
        })
    }

    /// Each segment is percent-encoded on its own, so a `/` or `..` inside a
    /// document id cannot leave the index path.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        let req = self.client.request(method, url);
        Ok(match self.username {
            Some(ref user) => req.basic_auth(user, self.password.as_deref()),
            None => req,
        })
    }

    async fn send(&self, req: RequestBuilder) -> Result<(StatusCode, Value)> {
        let response = req.send().await.map_err(|e| {
            GatewayError::engine(format!(
                "cannot reach Elasticsearch at {}: {}",
                self.base_url, e
            ))
        })?;
        let status = response.status();
        let text = response.text().await.map_err(GatewayError::engine)?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, body))
    }

    fn unexpected(&self, op: &str, status: StatusCode, body: &Value) -> GatewayError {
        GatewayError::engine(format!(
            "{} on index '{}' failed with {}: {}",
            op,
            self.index,
            status,
            error_reason(body)
        ))
    }
}

/// Append `segments` to the cluster URL, one encoded path segment each.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| GatewayError::engine(format!("cannot build request path on {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Build the `_search` body for a hybrid query.
pub fn build_search_body(query: &HybridQuery) -> Value {
    json!({
        "query": {
            "bool": {
                "must": {
                    "multi_match": {
                        "query": query.text,
                        "fields": LEXICAL_FIELDS,
                        "boost": query.lexical_boost,
                    }
                }
            }
        },
        "knn": {
            "field": EMBEDDING_FIELD,
            "query_vector": query.query_vector,
            "num_candidates": query.num_candidates,
            "k": query.k,
            "boost": query.vector_boost,
        },
        "size": query.size,
        "from": query.from,
        "_source": { "excludes": [EMBEDDING_FIELD] },
    })
}

/// Index mapping: only the vector field needs an explicit type.
pub fn index_mapping(dims: usize) -> Value {
    json!({
        "mappings": {
            "properties": {
                EMBEDDING_FIELD: { "type": "dense_vector", "dims": dims }
            }
        }
    })
}

/// Serialize a document with its embedding attached.
pub fn source_with_embedding(doc: &IndexedDocument) -> Result<Value> {
    let mut source = serde_json::to_value(&doc.document).map_err(GatewayError::engine)?;
    if let Value::Object(ref mut map) = source {
        map.insert(EMBEDDING_FIELD.to_string(), json!(doc.embedding));
    }
    Ok(source)
}

/// Build the NDJSON body for `POST /_bulk`.
pub fn build_bulk_body(index: &str, docs: &[IndexedDocument]) -> Result<String> {
    let mut body = String::new();
    for doc in docs {
        body.push_str(&json!({ "index": { "_index": index } }).to_string());
        body.push('\n');
        body.push_str(&source_with_embedding(doc)?.to_string());
        body.push('\n');
    }
    Ok(body)
}

/// Translate the `_bulk` response into typed per-item statuses.
pub fn parse_bulk_response(body: &Value) -> Result<Vec<BulkItemStatus>> {
    let items = body
        .get("items")
        .and_then(|i| i.as_array())
        .ok_or_else(|| GatewayError::engine("invalid bulk response: missing items"))?;

    Ok(items
        .iter()
        .map(|item| {
            let action = item
                .get("index")
                .or_else(|| item.get("create"))
                .unwrap_or(item);
            match (action.get("error"), action.get("_id").and_then(|v| v.as_str())) {
                (Some(err), _) => BulkItemStatus::Failed {
                    reason: error_reason_inner(err),
                },
                (None, Some(id)) => BulkItemStatus::Indexed { id: id.to_string() },
                (None, None) => BulkItemStatus::Failed {
                    reason: "bulk item carried neither _id nor error".to_string(),
                },
            }
        })
        .collect())
}

/// Translate a `_search` response into [`EngineHits`].
pub fn parse_search_response(body: &Value) -> Result<EngineHits> {
    let hits = body
        .get("hits")
        .ok_or_else(|| GatewayError::engine("invalid search response: missing hits"))?;

    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(obj) => obj.get("value").and_then(|v| v.as_u64()).unwrap_or(0),
        None => 0,
    };

    let entries = hits
        .get("hits")
        .and_then(|h| h.as_array())
        .ok_or_else(|| GatewayError::engine("invalid search response: missing hits.hits"))?;

    let mut parsed = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = entry
            .get("_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::engine("invalid search response: hit without _id"))?;
        parsed.push(EngineHit {
            id: id.to_string(),
            document: parse_source(entry.get("_source"))?,
            score: entry.get("_score").and_then(|s| s.as_f64()).unwrap_or(0.0),
            lexical_score: None,
            vector_score: None,
        });
    }

    Ok(EngineHits {
        total,
        hits: parsed,
    })
}

/// Translate a `GET /{index}/_doc/{id}` body. Anything but a found
/// document with a `_source` for the requested id is `None`.
pub fn parse_get_response(id: &str, body: &Value) -> Result<Option<StoredDocument>> {
    if body.get("found").and_then(|f| f.as_bool()) != Some(true) {
        return Ok(None);
    }
    if body.get("_id").and_then(|v| v.as_str()) != Some(id) {
        return Ok(None);
    }
    let Some(source) = body.get("_source").filter(|s| s.is_object()) else {
        return Ok(None);
    };
    Ok(Some(StoredDocument {
        id: id.to_string(),
        document: parse_source(Some(source))?,
    }))
}

fn parse_source(source: Option<&Value>) -> Result<Document> {
    let mut source = source.cloned().unwrap_or_else(|| json!({}));
    if let Value::Object(ref mut map) = source {
        map.remove(EMBEDDING_FIELD);
        // Documents indexed without content still render.
        map.entry("content").or_insert_with(|| json!(""));
    }
    serde_json::from_value(source)
        .map_err(|e| GatewayError::engine(format!("unreadable _source: {}", e)))
}

fn error_reason(body: &Value) -> String {
    match body.get("error") {
        Some(err) => error_reason_inner(err),
        None => body.to_string(),
    }
}

fn error_reason_inner(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        other => {
            let kind = other.get("type").and_then(|t| t.as_str()).unwrap_or("error");
            let reason = other
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("unknown reason");
            format!("{}: {}", kind, reason)
        }
    }
}

#[async_trait]
impl SearchEngine for ElasticsearchEngine {
    fn backend(&self) -> &str {
        "elasticsearch"
    }

    async fn create_index(&self, dims: usize) -> Result<()> {
        let (status, body) = self
            .send(
                self.request(Method::PUT, &[self.index.as_str()])?
                    .json(&index_mapping(dims)),
            )
            .await?;
        if body["error"]["type"] == "resource_already_exists_exception" {
            debug!(index = %self.index, "index already exists");
            return Ok(());
        }
        if !status.is_success() {
            return Err(self.unexpected("create index", status, &body));
        }
        info!(index = %self.index, dims, "created elasticsearch index");
        Ok(())
    }

    async fn delete_index(&self, ignore_missing: bool) -> Result<()> {
        let (status, body) = self
            .send(self.request(Method::DELETE, &[self.index.as_str()])?)
            .await?;
        if status == StatusCode::NOT_FOUND && ignore_missing {
            debug!(index = %self.index, "index did not exist, nothing to delete");
            return Ok(());
        }
        if !status.is_success() {
            return Err(self.unexpected("delete index", status, &body));
        }
        info!(index = %self.index, "deleted elasticsearch index");
        Ok(())
    }

    async fn bulk_index(&self, docs: &[IndexedDocument]) -> Result<Vec<BulkItemStatus>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let payload = build_bulk_body(&self.index, docs)?;
        let (status, body) = self
            .send(
                self.request(Method::POST, &["_bulk"])?
                    .query(&[("refresh", "wait_for")])
                    .header("Content-Type", "application/x-ndjson")
                    .body(payload),
            )
            .await?;
        if !status.is_success() {
            return Err(self.unexpected("bulk", status, &body));
        }
        let statuses = parse_bulk_response(&body)?;
        let failed = statuses
            .iter()
            .filter(|s| matches!(s, BulkItemStatus::Failed { .. }))
            .count();
        if failed > 0 {
            warn!(index = %self.index, failed, "bulk insert reported failed items");
        }
        Ok(statuses)
    }

    async fn index_one(&self, doc: &IndexedDocument) -> Result<DocumentId> {
        let source = source_with_embedding(doc)?;
        let (status, body) = self
            .send(
                self.request(Method::POST, &[self.index.as_str(), "_doc"])?
                    .json(&source),
            )
            .await?;
        if !status.is_success() {
            return Err(self.unexpected("index document", status, &body));
        }
        body.get("_id")
            .and_then(|v| v.as_str())
            .map(DocumentId::new)
            .ok_or_else(|| GatewayError::engine("index response missing _id"))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<StoredDocument>> {
        // Dot segments are dropped by URL normalization and can never name
        // a stored document.
        if matches!(id, "" | "." | "..") {
            return Ok(None);
        }
        let req = self
            .request(Method::GET, &[self.index.as_str(), "_doc", id])?
            .query(&[("_source_excludes", EMBEDDING_FIELD)]);
        let (status, body) = self.send(req).await?;

        // A missing document is 404 with `found: false`; a missing index is
        // 404 with an `error` object.
        if status == StatusCode::NOT_FOUND && body.get("error").is_none() {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.unexpected("get document", status, &body));
        }
        parse_get_response(id, &body)
    }

    async fn query(&self, query: &HybridQuery) -> Result<EngineHits> {
        let (status, body) = self
            .send(
                self.request(Method::POST, &[self.index.as_str(), "_search"])?
                    .json(&build_search_body(query)),
            )
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::engine(format!(
                "index '{}' does not exist",
                self.index
            )));
        }
        if !status.is_success() {
            return Err(self.unexpected("search", status, &body));
        }
        parse_search_response(&body)
    }
}
