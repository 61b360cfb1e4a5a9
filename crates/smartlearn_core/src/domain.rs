//! crates/smartlearn_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or vector-store backend;
//! the only serialization concern they carry is the conversation/quiz wire
//! shape consumed by clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A study document uploaded by a user.
///
/// Immutable once ingested; `ready` flips to true exactly once, when the
/// ingestion pipeline has finished upserting every chunk. A document whose
/// `ready` flag is false must never be offered for querying.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    /// Name of the isolated vector-index partition holding this document's
    /// chunks. Never shared between documents.
    pub index_namespace: String,
    pub ready: bool,
    pub created_at: DateTime<Utc>,
}

/// A single page of extracted document text. Created at ingestion, immutable.
///
/// `summary` is persisted empty and filled in later by on-demand
/// summarization; it is the only derived field on an ingested document.
#[derive(Debug, Clone)]
pub struct Page {
    pub document_id: Uuid,
    /// 1-based, contiguous.
    pub page_number: u32,
    pub text: String,
    pub summary: Option<String>,
}

/// A bounded span of page text, the unit of embedding and retrieval.
///
/// Chunks are ephemeral: they exist between the chunker and the vector
/// index, after which only their vector and `{page, text}` metadata persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub page_number: u32,
    /// Human-readable citation anchor, e.g. "Page 3".
    pub source_ref: String,
    pub text: String,
    /// Position of this chunk in the document-wide chunk sequence.
    pub sequence_index: usize,
}

/// One retrieval hit, surfaced to callers for citation display.
#[derive(Debug, Clone, Serialize)]
pub struct RankedMatch {
    pub score: f32,
    pub page_number: u32,
    pub snippet: String,
}

/// The author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a per-document conversation log.
///
/// Wire shape: `{"role": "user"|"assistant", "content": "...",
/// "timestamp": "<ISO 8601>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The kind of quiz to generate for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuizKind {
    /// The phrasing fed to the question-generation prompt.
    pub fn prompt_label(self) -> &'static str {
        match self {
            QuizKind::MultipleChoice => "multiple-choice",
            QuizKind::TrueFalse => "true/false",
            QuizKind::ShortAnswer => "short-answer",
        }
    }
}

/// A generated quiz question, parsed from the generation model's JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    /// Present only for multiple-choice questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// One answered question inside a quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    /// None until the attempt is submitted.
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub explanation: String,
}

/// A quiz attempt: created blank at generation time, mutated exactly once
/// when the user submits answers, then immutable.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub document_id: Uuid,
    pub total_questions: usize,
    /// Number of correct answers; None until submission.
    pub score: Option<usize>,
    pub answers: Vec<QuizAnswer>,
    pub attempted_at: DateTime<Utc>,
}
