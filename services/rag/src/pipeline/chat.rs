//! services/rag/src/pipeline/chat.rs
//!
//! Runs one full question-answering turn against a document: load history,
//! rewrite the question, retrieve grounding, synthesize an answer, and
//! append the turn to the conversation log.
//!
//! Turns on the same document are serialized through the conversation
//! store's version counter: the append is a compare-and-swap, and a losing
//! turn re-runs from the history read. Turns on different documents never
//! contend.

use crate::pipeline::retrieve::Retriever;
use crate::pipeline::rewrite::QueryRewriter;
use crate::pipeline::synthesize::AnswerSynthesizer;
use smartlearn_core::domain::{ChatMessage, Document, RankedMatch};
use smartlearn_core::ports::{
    ConversationStore, DocumentStore, PortError, PortResult, VersionedHistory,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// How many times a turn re-runs after losing the append race before the
/// conflict is surfaced to the caller.
const MAX_TURN_ATTEMPTS: u32 = 3;

/// The result of one successful conversation turn.
#[derive(Debug, Clone)]
pub struct ChatTurnOutcome {
    /// The standalone query actually used for retrieval.
    pub refined_question: String,
    pub answer: String,
    /// The full conversation log including this turn.
    pub history: Vec<ChatMessage>,
    /// The ranked context snippets backing the answer, for citation display.
    pub citations: Vec<RankedMatch>,
}

/// Orchestrates question-answering turns over ingested documents.
#[derive(Clone)]
pub struct ChatService {
    documents: Arc<dyn DocumentStore>,
    conversations: Arc<dyn ConversationStore>,
    rewriter: QueryRewriter,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    top_k: usize,
}

impl ChatService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        conversations: Arc<dyn ConversationStore>,
        rewriter: QueryRewriter,
        retriever: Retriever,
        synthesizer: AnswerSynthesizer,
        top_k: usize,
    ) -> Self {
        Self {
            documents,
            conversations,
            rewriter,
            retriever,
            synthesizer,
            top_k,
        }
    }

    /// Answers `question` grounded in the given document.
    ///
    /// A failure anywhere before the append leaves the conversation log
    /// untouched; a turn is recorded in full or not at all.
    pub async fn ask(&self, document_id: Uuid, question: &str) -> PortResult<ChatTurnOutcome> {
        let document = self.queryable_document(document_id).await?;

        for attempt in 1..=MAX_TURN_ATTEMPTS {
            let VersionedHistory { version, messages } =
                self.conversations.history(document_id).await?;

            let refined_question = self.rewriter.rewrite(question, &messages).await?;
            let context = self
                .retriever
                .retrieve(&refined_question, &document.index_namespace, self.top_k)
                .await?;
            let answer = self
                .synthesizer
                .synthesize(question, &messages, &context)
                .await?;

            let user_message = ChatMessage::user(question);
            let assistant_message = ChatMessage::assistant(&answer);

            match self
                .conversations
                .append_turn(
                    document_id,
                    version,
                    user_message.clone(),
                    assistant_message.clone(),
                )
                .await
            {
                Ok(()) => {
                    let mut history = messages;
                    history.push(user_message);
                    history.push(assistant_message);
                    info!(%document_id, turns = history.len() / 2, "Turn recorded");
                    return Ok(ChatTurnOutcome {
                        refined_question,
                        answer,
                        history,
                        citations: context.matches,
                    });
                }
                Err(PortError::Conflict(_)) if attempt < MAX_TURN_ATTEMPTS => {
                    warn!(%document_id, attempt, "Concurrent turn detected, replaying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("turn loop returns on the final attempt");
    }

    /// Returns the full conversation log for a document.
    pub async fn history(&self, document_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        // Resolve the document first so a missing id surfaces as NotFound.
        self.documents.get_document(document_id).await?;
        Ok(self.conversations.history(document_id).await?.messages)
    }

    /// Clears the conversation log for a document.
    pub async fn clear(&self, document_id: Uuid) -> PortResult<()> {
        self.documents.get_document(document_id).await?;
        self.conversations.clear(document_id).await
    }

    async fn queryable_document(&self, document_id: Uuid) -> PortResult<Document> {
        let document = self.documents.get_document(document_id).await?;
        if !document.ready {
            // Ingestion has not completed; the caller may retry later.
            return Err(PortError::IndexNotReady(document.index_namespace));
        }
        Ok(document)
    }
}
