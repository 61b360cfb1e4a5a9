//! Deterministic in-memory implementations of the core ports, used by the
//! pipeline integration tests. No network, no database, no randomness
//! beyond freshly generated ids.

use async_trait::async_trait;
use rag_lib::adapters::vector_index::cosine_similarity;
use smartlearn_core::domain::{ChatMessage, Document, Page, QuizAttempt};
use smartlearn_core::ports::{
    ConversationStore, DocumentStore, EmbeddingService, GenerationService, IndexEntry, PortError,
    PortResult, ScoredEntry, SimilarityMetric, VectorIndexService, VersionedHistory,
};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Embedders
//=========================================================================================

/// Hash-derived pseudo-embeddings: deterministic, and distinct texts map to
/// distinct directions.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                (text, i).hash(&mut hasher);
                // Spread into [-1, 1].
                (hasher.finish() % 2000) as f32 / 1000.0 - 1.0
            })
            .collect();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_document(&self, text: &str) -> PortResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_query(&self, text: &str) -> PortResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

/// Fails every call; used to abort ingestion mid-pipeline.
pub struct FailingEmbedder {
    dimension: usize,
}

impl FailingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingService for FailingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_document(&self, _text: &str) -> PortResult<Vec<f32>> {
        Err(PortError::Unexpected("embedding backend offline".to_string()))
    }

    async fn embed_query(&self, _text: &str) -> PortResult<Vec<f32>> {
        Err(PortError::Unexpected("embedding backend offline".to_string()))
    }
}

//=========================================================================================
// Vector Index
//=========================================================================================

struct NamespaceData {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// Brute-force cosine index over per-namespace entry lists.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    inner: Mutex<HashMap<String, NamespaceData>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn entry_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .get(name)
            .map(|ns| ns.entries.len())
            .unwrap_or(0)
    }

    pub fn entries(&self, name: &str) -> Vec<IndexEntry> {
        self.inner
            .lock()
            .unwrap()
            .get(name)
            .map(|ns| ns.entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndexService for InMemoryVectorIndex {
    async fn create_namespace(
        &self,
        name: &str,
        dimension: usize,
        _metric: SimilarityMetric,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.contains_key(name) {
            return Err(PortError::Conflict(format!(
                "Namespace '{}' already exists",
                name
            )));
        }
        inner.insert(
            name.to_string(),
            NamespaceData {
                dimension,
                entries: Vec::new(),
            },
        );
        Ok(())
    }

    async fn wait_ready(&self, name: &str, _timeout: Duration) -> PortResult<()> {
        if self.inner.lock().unwrap().contains_key(name) {
            Ok(())
        } else {
            Err(PortError::NotFound(format!("Namespace '{}' not found", name)))
        }
    }

    async fn upsert(&self, name: &str, entries: Vec<IndexEntry>) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let namespace = inner
            .get_mut(name)
            .ok_or_else(|| PortError::NotFound(format!("Namespace '{}' not found", name)))?;
        for entry in &entries {
            if entry.vector.len() != namespace.dimension {
                return Err(PortError::DimensionMismatch {
                    expected: namespace.dimension,
                    actual: entry.vector.len(),
                });
            }
        }
        namespace.entries.extend(entries);
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> PortResult<Vec<ScoredEntry>> {
        let inner = self.inner.lock().unwrap();
        let namespace = inner
            .get(name)
            .ok_or_else(|| PortError::NotFound(format!("Namespace '{}' not found", name)))?;
        if vector.len() != namespace.dimension {
            return Err(PortError::DimensionMismatch {
                expected: namespace.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<ScoredEntry> = namespace
            .entries
            .iter()
            .map(|entry| ScoredEntry {
                score: cosine_similarity(vector, &entry.vector),
                page: entry.page,
                text: entry.text.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_namespace(&self, name: &str) -> PortResult<()> {
        self.inner.lock().unwrap().remove(name);
        Ok(())
    }
}

//=========================================================================================
// Generators
//=========================================================================================

/// Always returns the same canned reply.
pub struct StubGenerator {
    reply: String,
}

impl StubGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl GenerationService for StubGenerator {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _system_instruction: Option<&str>,
    ) -> PortResult<String> {
        Ok(self.reply.clone())
    }
}

/// Always fails, simulating a generation backend outage.
pub struct FailingGenerator;

#[async_trait]
impl GenerationService for FailingGenerator {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _system_instruction: Option<&str>,
    ) -> PortResult<String> {
        Err(PortError::Unexpected("generation backend offline".to_string()))
    }
}

/// On its first call, sneaks a full turn into the conversation log before
/// replying, simulating a concurrent turn landing mid-synthesis. Later
/// calls reply normally.
pub struct RacingGenerator {
    store: Arc<InMemoryConversationStore>,
    document_id: Uuid,
    injected: AtomicBool,
    reply: String,
}

impl RacingGenerator {
    pub fn new(
        store: Arc<InMemoryConversationStore>,
        document_id: Uuid,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            store,
            document_id,
            injected: AtomicBool::new(false),
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl GenerationService for RacingGenerator {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _system_instruction: Option<&str>,
    ) -> PortResult<String> {
        if !self.injected.swap(true, Ordering::SeqCst) {
            let history = self.store.history(self.document_id).await?;
            self.store
                .append_turn(
                    self.document_id,
                    history.version,
                    ChatMessage::user("interleaved question"),
                    ChatMessage::assistant("interleaved answer"),
                )
                .await?;
        }
        Ok(self.reply.clone())
    }
}

//=========================================================================================
// Stores
//=========================================================================================

/// Map-backed `DocumentStore`.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<HashMap<Uuid, Document>>,
    pages: Mutex<HashMap<Uuid, Vec<Page>>>,
    attempts: Mutex<HashMap<Uuid, QuizAttempt>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt(&self, id: Uuid) -> Option<QuizAttempt> {
        self.attempts.lock().unwrap().get(&id).cloned()
    }

    /// Inserts a document record directly, bypassing ingestion.
    pub fn insert_document(&self, document: Document) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.id, document);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_document(
        &self,
        user_id: Uuid,
        title: &str,
        index_namespace: &str,
    ) -> PortResult<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            index_namespace: index_namespace.to_string(),
            ready: false,
            created_at: chrono::Utc::now(),
        };
        self.documents
            .lock()
            .unwrap()
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document> {
        self.documents
            .lock()
            .unwrap()
            .get(&document_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))
    }

    async fn mark_ready(&self, document_id: Uuid) -> PortResult<()> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents
            .get_mut(&document_id)
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))?;
        document.ready = true;
        Ok(())
    }

    async fn save_pages(&self, pages: &[Page]) -> PortResult<()> {
        let mut stored = self.pages.lock().unwrap();
        for page in pages {
            stored
                .entry(page.document_id)
                .or_default()
                .push(page.clone());
        }
        Ok(())
    }

    async fn get_pages(&self, document_id: Uuid) -> PortResult<Vec<Page>> {
        let mut pages = self
            .pages
            .lock()
            .unwrap()
            .get(&document_id)
            .cloned()
            .unwrap_or_default();
        pages.sort_by_key(|p| p.page_number);
        Ok(pages)
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        self.documents.lock().unwrap().remove(&document_id);
        self.pages.lock().unwrap().remove(&document_id);
        Ok(())
    }

    async fn save_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
        self.attempts
            .lock()
            .unwrap()
            .insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn record_quiz_result(&self, attempt: &QuizAttempt) -> PortResult<()> {
        let mut attempts = self.attempts.lock().unwrap();
        if !attempts.contains_key(&attempt.id) {
            return Err(PortError::NotFound(format!(
                "Quiz attempt {} not found",
                attempt.id
            )));
        }
        attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }
}

/// Map-backed `ConversationStore` with the same version compare-and-swap
/// semantics as the Postgres adapter.
#[derive(Default)]
pub struct InMemoryConversationStore {
    logs: Mutex<HashMap<Uuid, (u64, Vec<ChatMessage>)>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn history(&self, document_id: Uuid) -> PortResult<VersionedHistory> {
        let logs = self.logs.lock().unwrap();
        let (version, messages) = logs.get(&document_id).cloned().unwrap_or((0, Vec::new()));
        Ok(VersionedHistory { version, messages })
    }

    async fn append_turn(
        &self,
        document_id: Uuid,
        expected_version: u64,
        user_message: ChatMessage,
        assistant_message: ChatMessage,
    ) -> PortResult<()> {
        let mut logs = self.logs.lock().unwrap();
        let entry = logs.entry(document_id).or_insert((0, Vec::new()));
        if entry.0 != expected_version {
            return Err(PortError::Conflict(format!(
                "Conversation for document {} moved past version {}",
                document_id, expected_version
            )));
        }
        entry.0 += 1;
        entry.1.push(user_message);
        entry.1.push(assistant_message);
        Ok(())
    }

    async fn clear(&self, document_id: Uuid) -> PortResult<()> {
        let mut logs = self.logs.lock().unwrap();
        let entry = logs.entry(document_id).or_insert((0, Vec::new()));
        entry.0 += 1;
        entry.1.clear();
        Ok(())
    }
}
