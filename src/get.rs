//! Document retrieval by ID.
//!
//! Used by the `docsearch get` CLI command and the `GET /documents/{id}`
//! endpoints.

use crate::config::Config;
use crate::engine::SearchEngine;
use crate::error::{GatewayError, Result};
use crate::models::StoredDocument;
use crate::services::Services;

/// Fetch a stored document, or [`GatewayError::NotFound`].
pub async fn get_document(engine: &dyn SearchEngine, id: &str) -> Result<StoredDocument> {
    engine
        .get_by_id(id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(id.to_string()))
}

/// Split content into paragraphs, one per line.
pub fn paragraphs(content: &str) -> Vec<&str> {
    content.split('\n').collect()
}

/// CLI entry: `docsearch get`.
pub async fn run_get(config: &Config, id: &str) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let stored = get_document(services.engine.as_ref(), id).await?;
    let doc = &stored.document;

    println!("--- document ---");
    println!("id: {}", stored.id);
    println!("name: {}", doc.name.as_deref().unwrap_or("(untitled)"));
    if let Some(ref category) = doc.category {
        println!("category: {}", category);
    }
    if let Some(ref url) = doc.url {
        println!("url: {}", url);
    }
    if let Some(ref created_on) = doc.created_on {
        println!("created_on: {}", created_on);
    }
    if let Some(ref updated_at) = doc.updated_at {
        println!("updated_at: {}", updated_at);
    }
    if let Some(ref summary) = doc.summary {
        println!("summary: {}", summary);
    }
    println!();
    println!("--- content ---");
    println!("{}", doc.content);

    Ok(())
}
