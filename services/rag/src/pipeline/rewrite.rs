//! services/rag/src/pipeline/rewrite.rs
//!
//! Rewrites a follow-up question into a standalone query before retrieval,
//! resolving pronouns and ellipsis against the conversation so far.

const SYSTEM_INSTRUCTIONS: &str = "\
You are a query rewriting expert.
Based on the chat history, rewrite the user's question into a standalone question.
Only output the rewritten question.";

use crate::pipeline::retry;
use smartlearn_core::domain::ChatMessage;
use smartlearn_core::ports::{GenerationService, PortError, PortResult};
use std::sync::Arc;
use tracing::debug;

/// Produces a self-contained retrieval query from a question plus history.
#[derive(Clone)]
pub struct QueryRewriter {
    generator: Arc<dyn GenerationService>,
    retries: u32,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn GenerationService>, retries: u32) -> Self {
        Self { generator, retries }
    }

    /// Rewrites `question` against `history`.
    ///
    /// With no prior turns there is nothing to resolve, so the question is
    /// returned unchanged without a generation call. A generation failure is
    /// fatal for the turn: there is no silent fallback to the raw question.
    pub async fn rewrite(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> PortResult<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(question));

        let generator = Arc::clone(&self.generator);
        let rewritten = retry::with_backoff(self.retries, || {
            let generator = Arc::clone(&generator);
            let messages = messages.clone();
            async move {
                generator
                    .generate(&messages, Some(SYSTEM_INSTRUCTIONS))
                    .await
            }
        })
        .await
        .map_err(|e| match e {
            PortError::Unexpected(msg) => PortError::Rewrite(msg),
            other => other,
        })?;

        let rewritten = rewritten.trim().to_string();
        debug!(original = question, rewritten = %rewritten, "Rewrote question");
        Ok(rewritten)
    }
}
