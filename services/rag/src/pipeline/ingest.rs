//! services/rag/src/pipeline/ingest.rs
//!
//! Orchestrates document ingestion: namespace creation, chunking, embedding,
//! batched upserts, and page persistence. Ingestion either completes fully
//! (the document's `ready` flag flips) or aborts and cleans up after itself;
//! a half-ingested document is never left queryable.

use crate::pipeline::namespace::namespace_name;
use futures::future::try_join_all;
use smartlearn_core::chunker::{chunk_pages, ChunkConfig};
use smartlearn_core::domain::{Document, Page};
use smartlearn_core::ports::{
    DocumentStore, EmbeddingService, IndexEntry, PortError, PortResult, SimilarityMetric,
    VectorIndexService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Chunks embedded and upserted per round; bounds concurrency against
/// embedding and index rate limits.
const UPSERT_BATCH_SIZE: usize = 5;

/// Runs the upload-time ingestion flow for one document.
#[derive(Clone)]
pub struct IngestionPipeline {
    documents: Arc<dyn DocumentStore>,
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndexService>,
    chunk_config: ChunkConfig,
    ready_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndexService>,
        chunk_config: ChunkConfig,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            documents,
            embedder,
            index,
            chunk_config,
            ready_timeout,
        }
    }

    /// Ingests a document from its per-page extracted text.
    ///
    /// The returned document is `ready` and queryable. Any failure after
    /// namespace creation triggers best-effort cleanup of both the namespace
    /// and the document record, then aborts the whole upload. Cancellation
    /// is honored between embedding batches.
    pub async fn ingest(
        &self,
        user_id: Uuid,
        title: &str,
        page_texts: Vec<String>,
        cancel: &CancellationToken,
    ) -> PortResult<Document> {
        let namespace = namespace_name(title);
        info!(title, namespace = %namespace, "Starting ingestion");

        let mut document = self
            .documents
            .create_document(user_id, title, &namespace)
            .await?;

        if let Err(e) = self
            .index
            .create_namespace(&namespace, self.embedder.dimension(), SimilarityMetric::Cosine)
            .await
        {
            self.cleanup_document(document.id).await;
            return Err(e);
        }

        match self.run(&document, page_texts, cancel).await {
            Ok(()) => {
                document.ready = true;
                info!(document_id = %document.id, namespace = %namespace, "Ingestion complete");
                Ok(document)
            }
            Err(e) => {
                error!(document_id = %document.id, error = %e, "Ingestion failed, cleaning up");
                self.cleanup_namespace(&namespace).await;
                self.cleanup_document(document.id).await;
                Err(e)
            }
        }
    }

    /// Everything after namespace creation; failures here trigger cleanup.
    async fn run(
        &self,
        document: &Document,
        page_texts: Vec<String>,
        cancel: &CancellationToken,
    ) -> PortResult<()> {
        self.index
            .wait_ready(&document.index_namespace, self.ready_timeout)
            .await?;

        let pages: Vec<Page> = page_texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page {
                document_id: document.id,
                page_number: (i + 1) as u32,
                text,
                summary: None,
            })
            .collect();

        let chunks = chunk_pages(&pages, &self.chunk_config);
        info!(
            document_id = %document.id,
            pages = pages.len(),
            chunks = chunks.len(),
            "Chunking complete"
        );

        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            if cancel.is_cancelled() {
                info!(document_id = %document.id, "Ingestion cancelled");
                return Err(PortError::Unexpected("Ingestion was cancelled".to_string()));
            }

            let vectors = try_join_all(
                batch
                    .iter()
                    .map(|chunk| self.embedder.embed_document(&chunk.text)),
            )
            .await?;

            let entries: Vec<IndexEntry> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry {
                    vector,
                    page: chunk.page_number,
                    text: chunk.text.clone(),
                })
                .collect();

            self.index
                .upsert(&document.index_namespace, entries)
                .await?;
        }

        self.documents.save_pages(&pages).await?;
        self.documents.mark_ready(document.id).await?;
        Ok(())
    }

    async fn cleanup_namespace(&self, namespace: &str) {
        if let Err(e) = self.index.delete_namespace(namespace).await {
            warn!(namespace, error = %e, "Failed to clean up orphaned namespace");
        }
    }

    async fn cleanup_document(&self, document_id: Uuid) {
        if let Err(e) = self.documents.delete_document(document_id).await {
            warn!(%document_id, error = %e, "Failed to clean up document record");
        }
    }
}
