//! crates/smartlearn_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! embedding providers, or vector stores.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{ChatMessage, Document, Page, QuizAttempt};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every port operation.
///
/// Each variant maps to a distinct caller decision: retry after a delay,
/// re-upload, fix configuration, or report. Adapters translate their
/// library-specific errors into these variants at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// A referenced document, page, or namespace does not exist. Not retryable.
    #[error("Item not found: {0}")]
    NotFound(String),

    /// The vector index namespace did not reach a ready state within the
    /// configured bound. Retryable by the caller after a delay.
    #[error("Vector index namespace '{0}' is not ready")]
    IndexNotReady(String),

    /// Stored and query embedding dimensions disagree. Indicates
    /// configuration drift; fatal, never retried.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The query-rewriting generation call failed.
    #[error("Query rewrite failed: {0}")]
    Rewrite(String),

    /// The answer-synthesis generation call failed.
    #[error("Answer synthesis failed: {0}")]
    Synthesis(String),

    /// Generation output failed a required post-parse (e.g. no JSON array in
    /// quiz output). Distinct from a network failure; not retried.
    #[error("Malformed generation output: {0}")]
    MalformedOutput(String),

    /// An optimistic write lost a version race, or a unique name collided.
    /// The caller may re-read and retry.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    /// Anything the taxonomy does not cover. Treated as transient by the
    /// generation retry helper, fatal everywhere else.
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Vector Index Value Types
//=========================================================================================

/// The similarity metric a namespace is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    Cosine,
}

impl SimilarityMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
        }
    }
}

/// One vector plus its citation metadata, as stored in the index.
///
/// The metadata field names `page` and `text` are load-bearing: the
/// citation-rendering consumer reads them verbatim.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub page: u32,
    pub text: String,
}

/// One nearest-neighbor hit returned from a namespace query.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub score: f32,
    pub page: u32,
    pub text: String,
}

/// A conversation log snapshot plus the version counter guarding it.
///
/// `version` is the compare-and-swap token for `append_turn`: it changes on
/// every successful append or clear, so a stale snapshot can never be
/// extended into a divergent branch.
#[derive(Debug, Clone, Default)]
pub struct VersionedHistory {
    pub version: u64,
    pub messages: Vec<ChatMessage>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Maps text to fixed-dimension vectors.
///
/// Ingestion and querying must go through the same implementation: a
/// dimension disagreement between stored and query vectors is a contract
/// violation, surfaced as `PortError::DimensionMismatch`.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// The fixed output dimension D of this embedder.
    fn dimension(&self) -> usize;

    /// Embeds a chunk of document text for storage.
    async fn embed_document(&self, text: &str) -> PortResult<Vec<f32>>;

    /// Embeds a search query. Same dimension as `embed_document`; the prompt
    /// template may differ.
    async fn embed_query(&self, text: &str) -> PortResult<Vec<f32>>;
}

/// A vector store partitioned into per-document namespaces.
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Creates a namespace. A name collision must fail loudly with
    /// `PortError::Conflict`, never silently overwrite.
    async fn create_namespace(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> PortResult<()>;

    /// Blocks until the namespace reports ready, polling with backoff.
    /// Exceeding `timeout` yields `PortError::IndexNotReady`.
    async fn wait_ready(&self, name: &str, timeout: Duration) -> PortResult<()>;

    /// Inserts entries into a namespace.
    async fn upsert(&self, name: &str, entries: Vec<IndexEntry>) -> PortResult<()>;

    /// Returns the top-K nearest neighbors of `vector` within `name` only,
    /// ordered by descending similarity.
    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> PortResult<Vec<ScoredEntry>>;

    /// Removes a namespace and all of its entries.
    async fn delete_namespace(&self, name: &str) -> PortResult<()>;
}

/// A chat-style text generation capability.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generates a completion for the ordered message history, optionally
    /// constrained by a system instruction.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        system_instruction: Option<&str>,
    ) -> PortResult<String>;
}

/// Persistence for documents, their pages, and quiz attempts.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document record with `ready = false`.
    async fn create_document(
        &self,
        user_id: Uuid,
        title: &str,
        index_namespace: &str,
    ) -> PortResult<Document>;

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document>;

    /// Records ingestion completion; the document becomes queryable.
    async fn mark_ready(&self, document_id: Uuid) -> PortResult<()>;

    /// Persists page records. Summaries are stored as given (empty at
    /// ingestion time).
    async fn save_pages(&self, pages: &[Page]) -> PortResult<()>;

    async fn get_pages(&self, document_id: Uuid) -> PortResult<Vec<Page>>;

    /// Removes a document and its pages. The caller is responsible for the
    /// matching namespace deletion.
    async fn delete_document(&self, document_id: Uuid) -> PortResult<()>;

    // --- Quiz bookkeeping ---
    async fn save_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()>;

    /// Stores the scored answers and final score of a submitted attempt.
    async fn record_quiz_result(&self, attempt: &QuizAttempt) -> PortResult<()>;
}

/// An append-only conversation log per document, guarded by a version
/// counter for optimistic concurrency control.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the full ordered log and its current version. A document with
    /// no conversation yet yields an empty log at version 0.
    async fn history(&self, document_id: Uuid) -> PortResult<VersionedHistory>;

    /// Appends one full turn (user message then assistant message)
    /// atomically, if and only if the stored version still equals
    /// `expected_version`. A lost race yields `PortError::Conflict` and
    /// persists nothing.
    async fn append_turn(
        &self,
        document_id: Uuid,
        expected_version: u64,
        user_message: ChatMessage,
        assistant_message: ChatMessage,
    ) -> PortResult<()>;

    /// Truncates the log to empty. Bumps the version so in-flight turns
    /// against the old log fail their compare-and-swap.
    async fn clear(&self, document_id: Uuid) -> PortResult<()>;
}
