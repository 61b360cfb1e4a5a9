//! services/rag/src/adapters/embeddings.rs
//!
//! This module contains the adapter for the embedding model.
//! It implements the `EmbeddingService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig, error::OpenAIError, types::embeddings::CreateEmbeddingRequestArgs,
    Client,
};
use async_trait::async_trait;
use smartlearn_core::ports::{EmbeddingService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `EmbeddingService` using an OpenAI-compatible
/// embedding model.
///
/// The configured dimension is the contract the vector index is created
/// against: a response vector of any other length is configuration drift and
/// surfaces as `PortError::DimensionMismatch`.
#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingAdapter {
    /// Creates a new `OpenAiEmbeddingAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, dimension: usize) -> Self {
        Self {
            client,
            model,
            dimension,
        }
    }

    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                PortError::Unexpected("Embedding response contained no vectors.".to_string())
            })?;

        if vector.len() != self.dimension {
            return Err(PortError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

//=========================================================================================
// `EmbeddingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingAdapter {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_document(&self, text: &str) -> PortResult<Vec<f32>> {
        self.embed(text).await
    }

    async fn embed_query(&self, text: &str) -> PortResult<Vec<f32>> {
        // The model applies the same template to queries and documents.
        self.embed(text).await
    }
}
