//! Retrieval-grounded question answering.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::generation::GenerationProvider;
use crate::models::{ChatAnswer, RankedHit};
use crate::prompt::PromptAssembler;
use crate::retrieval::RetrievalPipeline;
use crate::services::Services;

pub struct Chat {
    pipeline: Arc<RetrievalPipeline>,
    assembler: PromptAssembler,
    generator: Arc<dyn GenerationProvider>,
    context_k: u32,
}

impl Chat {
    pub fn new(
        pipeline: Arc<RetrievalPipeline>,
        assembler: PromptAssembler,
        generator: Arc<dyn GenerationProvider>,
        context_k: u32,
    ) -> Self {
        Self {
            pipeline,
            assembler,
            generator,
            context_k: context_k.max(1),
        }
    }

    /// Send the bare question to the model, with no retrieved context.
    pub async fn answer(&self, question: &str) -> Result<String> {
        validate_question(question)?;
        self.complete(question).await
    }

    /// Ground the model on `documents` (in the given order) and answer.
    pub async fn answer_with_documents(
        &self,
        question: &str,
        documents: &[RankedHit],
    ) -> Result<String> {
        validate_question(question)?;
        let prompt = self.assembler.assemble(question, documents);
        self.complete(&prompt).await
    }

    /// Retrieve the top `context_k` documents, then answer from them.
    ///
    /// The answer text is returned exactly as the model produced it; any
    /// `SOURCES:` line it contains is not checked against `sources`.
    pub async fn ask(&self, question: &str) -> Result<ChatAnswer> {
        validate_question(question)?;
        let sources = self.pipeline.retrieve(question, self.context_k).await?;
        if sources.is_empty() {
            warn!("no documents retrieved; answering without context");
        }
        let answer = self.answer_with_documents(question, &sources).await?;
        info!(
            model = self.generator.model_name(),
            sources = sources.len(),
            answer_len = answer.len(),
            "chat answered"
        );
        Ok(ChatAnswer { answer, sources })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generator.complete(prompt).await.inspect_err(|e| {
            warn!(model = self.generator.model_name(), error = %e, "generation failed");
        })
    }
}

fn validate_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(GatewayError::Validation(
            "question must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// CLI entry: `docsearch chat`.
pub async fn run_chat(config: &Config, question: &str, no_context: bool) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;

    if no_context {
        println!("{}", services.chat.answer(question).await?);
        return Ok(());
    }

    let reply = services.chat.ask(question).await?;
    println!("{}", reply.answer);
    if !reply.sources.is_empty() {
        println!();
        println!("Retrieved:");
        for hit in &reply.sources {
            println!(
                "  - {} ({})",
                hit.document.name.as_deref().unwrap_or("(untitled)"),
                hit.id
            );
        }
    }
    Ok(())
}
