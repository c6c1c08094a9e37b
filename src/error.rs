//! Error taxonomy for the search and chat pipeline.
//!
//! Every failure that crosses the library boundary is one of the
//! [`GatewayError`] variants. External-service failures are never retried and
//! never downgraded into empty results; the zero-hits case is a success.

use thiserror::Error;

/// Errors surfaced by retrieval, generation, document lookup, and ingestion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Bad caller input (empty query, non-positive `top_k`, ...).
    #[error("invalid request: {0}")]
    Validation(String),

    /// The requested document id does not exist in the index.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The embedding provider could not produce a vector.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The search engine could not be reached, or the index does not exist.
    #[error("search engine unavailable: {0}")]
    SearchEngineUnavailable(String),

    /// The generation provider failed to return a completion.
    #[error("generation provider unavailable: {0}")]
    GenerationUnavailable(String),

    /// The ingestion file is missing or is not a JSON array of documents.
    #[error("ingestion format error: {0}")]
    IngestionFormat(String),
}

impl GatewayError {
    /// Stable machine-readable code, used in HTTP error bodies and reports.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "bad_request",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::EmbeddingUnavailable(_) => "embedding_unavailable",
            GatewayError::SearchEngineUnavailable(_) => "search_engine_unavailable",
            GatewayError::GenerationUnavailable(_) => "generation_unavailable",
            GatewayError::IngestionFormat(_) => "ingestion_format",
        }
    }

    pub(crate) fn engine(err: impl std::fmt::Display) -> Self {
        GatewayError::SearchEngineUnavailable(err.to_string())
    }

    pub(crate) fn embedding(err: impl std::fmt::Display) -> Self {
        GatewayError::EmbeddingUnavailable(err.to_string())
    }

    pub(crate) fn generation(err: impl std::fmt::Display) -> Self {
        GatewayError::GenerationUnavailable(err.to_string())
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        GatewayError::engine(err)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errs = [
            GatewayError::Validation(String::new()),
            GatewayError::NotFound(String::new()),
            GatewayError::EmbeddingUnavailable(String::new()),
            GatewayError::SearchEngineUnavailable(String::new()),
            GatewayError::GenerationUnavailable(String::new()),
            GatewayError::IngestionFormat(String::new()),
        ];
        let mut codes: Vec<&str> = errs.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errs.len());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = GatewayError::NotFound("abc".to_string());
        assert_eq!(err.to_string(), "document not found: abc");
    }

    #[test]
    fn test_sqlx_error_maps_to_engine() {
        let err: GatewayError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), "search_engine_unavailable");
    }
}
