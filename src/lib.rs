//! # docsearch
//!
//! Hybrid document search and retrieval-grounded chat over a full-text +
//! vector search engine.
//!
//! Documents are indexed with an embedding of their summary. Queries run one
//! combined request that boosts a lexical `multi_match` clause and a vector
//! nearest-neighbour clause; the engine's fused score orders the results.
//! Chat retrieves the best document(s), wraps them in a fixed grounding
//! prompt and forwards it to a language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────────────┐
//! │ Ingestor │──▶│ Embedding  │──▶│ SearchEngine        │
//! └──────────┘   │ Provider   │   │ Elasticsearch/SQLite│
//!                └─────┬──────┘   └──────────┬──────────┘
//!                      │                     │
//!                      ▼                     ▼
//!               ┌──────────────────────────────────┐
//!               │ RetrievalPipeline                │
//!               └───────────────┬──────────────────┘
//!                               ▼
//!           ┌────────────────┐     ┌────────────────────┐
//!           │ PromptAssembler│────▶│ GenerationProvider │
//!           └────────────────┘     └────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsearch init
//! docsearch reindex data/documents.json
//! docsearch search "password reset" --top-k 5
//! docsearch chat "How do I reset my password?"
//! docsearch serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`engine`] | Search engine abstraction and backends |
//! | [`retrieval`] | Hybrid retrieval pipeline |
//! | [`prompt`] | Grounding prompt assembly |
//! | [`generation`] | Language model providers |
//! | [`chat`] | Retrieval-grounded answers |
//! | [`ingest`] | Single insert and bulk reindex |
//! | [`get`] | Document lookup |
//! | [`services`] | Service wiring |
//! | [`server`] | JSON HTTP gateway |

pub mod chat;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod get;
pub mod ingest;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod server;
pub mod services;
