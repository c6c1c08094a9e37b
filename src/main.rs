//! # docsearch CLI
//!
//! ```bash
//! docsearch --config ./config/docsearch.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsearch init` | Create the index if it does not exist |
//! | `docsearch reindex <file>` | Rebuild the index from a JSON array of documents |
//! | `docsearch add <file>` | Insert one JSON document |
//! | `docsearch search "<query>"` | Hybrid search |
//! | `docsearch get <id>` | Print a stored document |
//! | `docsearch chat "<question>"` | Answer a question from retrieved documents |
//! | `docsearch serve` | Start the HTTP gateway |
//!
//! Logs go to stderr; set `RUST_LOG` (default `docsearch=info`) to adjust.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docsearch::{chat, config, engine, get, ingest, retrieval, server};

/// Hybrid document search and grounded chat.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docsearch.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docsearch",
    about = "Hybrid keyword + semantic document search with retrieval-grounded chat",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index with a vector field sized to the embedding model.
    ///
    /// Idempotent: an existing index is left as is.
    Init,

    /// Drop the index and rebuild it from a JSON file.
    ///
    /// The file must hold an array of objects, each with `summary` and
    /// `content`.
    Reindex {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Insert a single document from a JSON file and print its id.
    Add {
        /// Path to a JSON object with at least `content`.
        file: PathBuf,
    },

    /// Hybrid keyword + semantic search.
    Search {
        /// Search query text.
        query: String,

        /// Number of results (defaults to `[retrieval].default_top_k`).
        #[arg(long)]
        top_k: Option<u32>,

        /// Interactive paging: fixed page size, starting at `--from`.
        #[arg(long)]
        page: bool,

        /// Page offset, used with `--page`.
        #[arg(long, default_value_t = 0)]
        from: u32,
    },

    /// Print a stored document by id.
    Get {
        /// Document id assigned at insertion.
        id: String,
    },

    /// Answer a question grounded on retrieved documents.
    Chat {
        /// The question.
        question: String,

        /// Send the question to the model without retrieved context.
        #[arg(long)]
        no_context: bool,
    },

    /// Start the HTTP gateway on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docsearch=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            engine::run_init(&cfg).await?;
        }
        Commands::Reindex { file } => {
            ingest::run_reindex(&cfg, &file).await?;
        }
        Commands::Add { file } => {
            ingest::run_add(&cfg, &file).await?;
        }
        Commands::Search {
            query,
            top_k,
            page,
            from,
        } => {
            let from = page.then_some(from);
            retrieval::run_search(&cfg, &query, top_k, from).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Chat {
            question,
            no_context,
        } => {
            chat::run_chat(&cfg, &question, no_context).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
