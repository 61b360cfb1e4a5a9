//! services/rag/src/pipeline/synthesize.rs
//!
//! Generates a grounded answer from conversation history plus retrieved
//! context, with inline page citations and an explicit "not found" fallback.

/// The literal fallback the model must produce when the context does not
/// contain the answer. Clients match this string byte-for-byte.
pub const NO_ANSWER_FALLBACK: &str = "I could not find the answer in the provided document.";

const SYSTEM_INSTRUCTIONS_TEMPLATE: &str = "\
You are a helpful teacher.
Use ONLY the provided context to answer.
If the answer is not in the context, say exactly: \"{fallback}\"
Cite pages inline in the form [page N] whenever you state a fact from the document.
Be concise and educational.

Context:
{context}";

use crate::pipeline::retrieve::RetrievedContext;
use crate::pipeline::retry;
use smartlearn_core::domain::ChatMessage;
use smartlearn_core::ports::{GenerationService, PortError, PortResult};
use std::sync::Arc;
use tracing::debug;

/// Synthesizes grounded answers from retrieved context.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationService>,
    retries: u32,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn GenerationService>, retries: u32) -> Self {
        Self { generator, retries }
    }

    /// Answers `question` using only `context`, with `history` supplying the
    /// conversational thread.
    ///
    /// An empty context means no grounding is available, so the fallback is
    /// returned directly without a generation call; a model cannot derive an
    /// answer from nothing, and the fallback must be byte-exact.
    pub async fn synthesize(
        &self,
        question: &str,
        history: &[ChatMessage],
        context: &RetrievedContext,
    ) -> PortResult<String> {
        if context.is_empty() {
            debug!("No grounding retrieved; returning the fallback answer");
            return Ok(NO_ANSWER_FALLBACK.to_string());
        }

        let instructions = SYSTEM_INSTRUCTIONS_TEMPLATE
            .replace("{fallback}", NO_ANSWER_FALLBACK)
            .replace("{context}", &context.prompt_block);

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(question));

        let generator = Arc::clone(&self.generator);
        let answer = retry::with_backoff(self.retries, || {
            let generator = Arc::clone(&generator);
            let messages = messages.clone();
            let instructions = instructions.clone();
            async move { generator.generate(&messages, Some(&instructions)).await }
        })
        .await
        .map_err(|e| match e {
            PortError::Unexpected(msg) => PortError::Synthesis(msg),
            other => other,
        })?;

        Ok(answer.trim().to_string())
    }
}
