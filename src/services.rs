//! Wiring: builds the shared service graph from configuration.
//!
//! Every collaborator is constructed once and shared behind an `Arc`. Tests
//! inject fakes through [`Services::from_parts`].

use std::sync::Arc;
use tracing::info;

use crate::chat::Chat;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::engine::{create_engine, SearchEngine};
use crate::generation::{create_generator, GenerationProvider};
use crate::ingest::Ingestor;
use crate::prompt::PromptAssembler;
use crate::retrieval::{RetrievalParams, RetrievalPipeline};

#[derive(Clone)]
pub struct Services {
    pub engine: Arc<dyn SearchEngine>,
    pub pipeline: Arc<RetrievalPipeline>,
    pub chat: Arc<Chat>,
    pub ingestor: Arc<Ingestor>,
}

impl Services {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let engine = create_engine(config).await?;
        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        info!(
            backend = engine.backend(),
            embedding = embedder.model_name(),
            generation = generator.model_name(),
            "services ready"
        );
        Ok(Self::from_parts(config, engine, embedder, generator))
    }

    pub fn from_parts(
        config: &Config,
        engine: Arc<dyn SearchEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        let pipeline = Arc::new(RetrievalPipeline::new(
            engine.clone(),
            embedder.clone(),
            RetrievalParams::from(&config.retrieval),
        ));
        let chat = Arc::new(Chat::new(
            pipeline.clone(),
            PromptAssembler::new(&config.prompt),
            generator,
            config.prompt.context_documents,
        ));
        let ingestor = Arc::new(
            Ingestor::new(engine.clone(), embedder).with_batch_size(config.embedding.batch_size),
        );

        Self {
            engine,
            pipeline,
            chat,
            ingestor,
        }
    }
}
