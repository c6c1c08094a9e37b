//! Hybrid retrieval: one embedding call, one combined engine query.
//!
//! [`RetrievalPipeline`] turns a free-text query into a ranked list of
//! documents by embedding the query and issuing a single [`HybridQuery`]
//! that carries both a boosted lexical clause and a boosted vector clause.
//! The engine's fused score is authoritative; the pipeline never re-sorts.
//!
//! Two entry points share the same query shape:
//!
//! | Operation | `k` | `size` | `from` |
//! |-----------|-----|--------|--------|
//! | [`RetrievalPipeline::retrieve`] | `top_k` | `top_k` | `0` |
//! | [`RetrievalPipeline::search_page`] | `interactive_k` | `interactive_page_size` | caller |

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{Config, RetrievalConfig};
use crate::embedding::EmbeddingProvider;
use crate::engine::{EngineHit, HybridQuery, SearchEngine, MAX_RESULT_WINDOW};
use crate::error::{GatewayError, Result};
use crate::models::{RankedHit, SearchPage};
use crate::services::Services;

/// Tuning knobs for [`RetrievalPipeline`], usually built from `[retrieval]`.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub lexical_boost: f64,
    pub vector_boost: f64,
    pub num_candidates: u32,
    pub interactive_k: u32,
    pub interactive_page_size: u32,
    pub default_top_k: u32,
    pub max_top_k: Option<u32>,
    pub timeout: Duration,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            lexical_boost: cfg.lexical_boost,
            vector_boost: cfg.vector_boost,
            num_candidates: cfg.num_candidates,
            interactive_k: cfg.interactive_k,
            interactive_page_size: cfg.interactive_page_size,
            default_top_k: cfg.default_top_k,
            max_top_k: cfg.max_top_k,
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

pub struct RetrievalPipeline {
    engine: Arc<dyn SearchEngine>,
    embedder: Arc<dyn EmbeddingProvider>,
    params: RetrievalParams,
}

impl RetrievalPipeline {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            engine,
            embedder,
            params,
        }
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// `top_k` to use when the caller did not supply one.
    pub fn resolve_top_k(&self, top_k: Option<u32>) -> u32 {
        top_k.unwrap_or(self.params.default_top_k)
    }

    /// Return up to `top_k` documents ordered by blended relevance.
    ///
    /// Ordering is whatever the engine reports. Hits with equal scores may
    /// come back in any order; callers must not rely on a tie-break.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Validation`] for a blank query, `top_k < 1`, or a
    ///   `top_k` past [`MAX_RESULT_WINDOW`] once `max_top_k` is applied.
    /// - [`GatewayError::EmbeddingUnavailable`] when the query cannot be embedded.
    /// - [`GatewayError::SearchEngineUnavailable`] when the engine fails or
    ///   the index does not exist.
    ///
    /// Zero matches is `Ok(vec![])`.
    pub async fn retrieve(&self, query_text: &str, top_k: u32) -> Result<Vec<RankedHit>> {
        validate_query(query_text)?;
        if top_k < 1 {
            return Err(GatewayError::Validation("top_k must be >= 1".to_string()));
        }
        let top_k = match self.params.max_top_k {
            Some(cap) => top_k.min(cap),
            None => top_k,
        };
        if top_k > MAX_RESULT_WINDOW {
            return Err(GatewayError::Validation(format!(
                "top_k must be <= {}",
                MAX_RESULT_WINDOW
            )));
        }

        let started = Instant::now();
        let query_vector = self.embed_query(query_text).await?;
        let query = self.hybrid_query(query_text, query_vector, top_k, top_k, 0);
        let result = self.run_query(&query).await?;

        let mut hits: Vec<RankedHit> = result.hits.into_iter().map(to_ranked).collect();
        hits.truncate(top_k as usize);

        info!(
            query_len = query_text.len(),
            top_k,
            hits = hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieve"
        );
        Ok(hits)
    }

    /// One page of interactive results starting at `from`.
    ///
    /// Same errors as [`retrieve`](Self::retrieve); a page ending past
    /// [`MAX_RESULT_WINDOW`] is a validation error.
    pub async fn search_page(&self, query_text: &str, from: u32) -> Result<SearchPage> {
        validate_query(query_text)?;

        let started = Instant::now();
        let size = self.params.interactive_page_size;
        if u64::from(from) + u64::from(size) > u64::from(MAX_RESULT_WINDOW) {
            return Err(GatewayError::Validation(format!(
                "from_ + page size must be <= {}",
                MAX_RESULT_WINDOW
            )));
        }
        let query_vector = self.embed_query(query_text).await?;
        let query = self.hybrid_query(
            query_text,
            query_vector,
            self.params.interactive_k,
            size,
            from,
        );
        let result = self.run_query(&query).await?;

        let mut hits: Vec<RankedHit> = result.hits.into_iter().map(to_ranked).collect();
        hits.truncate(size as usize);

        info!(
            query_len = query_text.len(),
            from,
            hits = hits.len(),
            total = result.total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search_page"
        );
        Ok(SearchPage {
            query: query_text.to_string(),
            hits,
            total: result.total,
            from,
            size,
        })
    }

    fn hybrid_query(
        &self,
        text: &str,
        query_vector: Vec<f32>,
        k: u32,
        size: u32,
        from: u32,
    ) -> HybridQuery {
        HybridQuery {
            text: text.to_string(),
            query_vector,
            lexical_boost: self.params.lexical_boost,
            vector_boost: self.params.vector_boost,
            num_candidates: self.params.num_candidates.max(k).min(MAX_RESULT_WINDOW),
            k,
            size,
            from,
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vector = tokio::time::timeout(self.params.timeout, self.embedder.embed(text))
            .await
            .map_err(|_| {
                GatewayError::embedding(format!(
                    "embedding timed out after {}s",
                    self.params.timeout.as_secs()
                ))
            })??;
        debug!(dims = vector.len(), "query embedded");
        Ok(vector)
    }

    async fn run_query(&self, query: &HybridQuery) -> Result<crate::engine::EngineHits> {
        let result = tokio::time::timeout(self.params.timeout, self.engine.query(query))
            .await
            .map_err(|_| {
                GatewayError::engine(format!(
                    "{} query timed out after {}s",
                    self.engine.backend(),
                    self.params.timeout.as_secs()
                ))
            })??;
        debug!(
            backend = self.engine.backend(),
            k = query.k,
            size = query.size,
            from = query.from,
            returned = result.hits.len(),
            total = result.total,
            "engine query"
        );
        Ok(result)
    }
}

fn validate_query(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(GatewayError::Validation(
            "query must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn to_ranked(hit: EngineHit) -> RankedHit {
    RankedHit {
        id: hit.id,
        document: hit.document,
        lexical_score: hit.lexical_score,
        vector_score: hit.vector_score,
        blended_score: hit.score,
    }
}

// ============ CLI ============

fn print_hits(hits: &[RankedHit], offset: usize) {
    for (i, hit) in hits.iter().enumerate() {
        let name = hit.document.name.as_deref().unwrap_or("(untitled)");
        println!("{}. [{:.4}] {}", offset + i + 1, hit.blended_score, name);
        if let Some(ref summary) = hit.document.summary {
            println!("    summary: \"{}\"", summary.replace('\n', " ").trim());
        }
        if let Some(ref url) = hit.document.url {
            println!("    url: {}", url);
        }
        println!("    id: {}", hit.id);
        println!();
    }
}

/// CLI entry: `docsearch search`.
///
/// With `from` set, prints one interactive page; otherwise the top `top_k`.
pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<u32>,
    from: Option<u32>,
) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let pipeline = &services.pipeline;

    match from {
        Some(from) => {
            let page = pipeline.search_page(query, from).await?;
            if page.hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            print_hits(&page.hits, from as usize);
            println!(
                "Showing {}-{} of {}",
                from as usize + 1,
                from as usize + page.hits.len(),
                page.total
            );
        }
        None => {
            let hits = pipeline
                .retrieve(query, pipeline.resolve_top_k(top_k))
                .await?;
            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            print_hits(&hits, 0);
        }
    }
    Ok(())
}
