//! services/rag/src/state.rs
//!
//! Defines the application's shared state: the injected port implementations
//! and constructors for the pipeline services built on top of them.
//!
//! Adapters are passed in explicitly; there is no ambient index client or
//! other process-wide singleton.

use crate::config::Config;
use crate::pipeline::{
    AnswerSynthesizer, ChatService, IngestionPipeline, QueryRewriter, QuizGenerator, Retriever,
};
use smartlearn_core::chunker::ChunkConfig;
use smartlearn_core::ports::{
    ConversationStore, DocumentStore, EmbeddingService, GenerationService, VectorIndexService,
};
use std::sync::Arc;

/// The shared application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub documents: Arc<dyn DocumentStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub index: Arc<dyn VectorIndexService>,
    pub generator: Arc<dyn GenerationService>,
}

impl AppState {
    /// Builds the upload-time ingestion pipeline. Fails if the configured
    /// chunk window violates `0 <= overlap < chunk_size`.
    pub fn ingestion_pipeline(&self) -> Result<IngestionPipeline, crate::error::RagError> {
        let chunk_config = ChunkConfig::new(self.config.chunk_size, self.config.chunk_overlap)
            .map_err(|e| crate::error::RagError::Internal(e.to_string()))?;
        Ok(IngestionPipeline::new(
            Arc::clone(&self.documents),
            Arc::clone(&self.embedder),
            Arc::clone(&self.index),
            chunk_config,
            self.config.index_ready_timeout,
        ))
    }

    /// Builds the per-turn question-answering service.
    pub fn chat_service(&self) -> ChatService {
        ChatService::new(
            Arc::clone(&self.documents),
            Arc::clone(&self.conversations),
            QueryRewriter::new(Arc::clone(&self.generator), self.config.generation_retries),
            self.retriever(),
            AnswerSynthesizer::new(Arc::clone(&self.generator), self.config.generation_retries),
            self.config.retrieval_top_k,
        )
    }

    /// Builds the quiz generation service.
    pub fn quiz_generator(&self) -> QuizGenerator {
        QuizGenerator::new(
            Arc::clone(&self.documents),
            self.retriever(),
            Arc::clone(&self.generator),
            self.config.generation_retries,
        )
    }

    fn retriever(&self) -> Retriever {
        Retriever::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.index),
            self.config.snippet_max_chars,
        )
    }
}
