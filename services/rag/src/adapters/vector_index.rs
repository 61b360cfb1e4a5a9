//! services/rag/src/adapters/vector_index.rs
//!
//! A Postgres-backed implementation of the `VectorIndexService` port.
//!
//! Namespaces are rows in `vector_namespaces`; entries live in
//! `vector_entries` with their embeddings encoded as little-endian f32
//! bytes. Queries are brute-force cosine similarity over one namespace,
//! which is exact and entirely adequate at single-document scale.

use async_trait::async_trait;
use smartlearn_core::ports::{
    IndexEntry, PortError, PortResult, ScoredEntry, SimilarityMetric, VectorIndexService,
};
use sqlx::{FromRow, PgPool, Row};
use std::time::Duration;
use tracing::{debug, warn};

/// Initial delay of the readiness poll; doubles each round.
const READY_POLL_INITIAL: Duration = Duration::from_millis(100);
/// Ceiling for a single poll delay.
const READY_POLL_MAX: Duration = Duration::from_secs(2);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A vector index adapter that implements the `VectorIndexService` port.
#[derive(Clone)]
pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    /// Creates a new `PgVectorIndex`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn namespace_dimension(&self, name: &str) -> PortResult<usize> {
        let dimension: i32 =
            sqlx::query("SELECT dimension FROM vector_namespaces WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?
                .ok_or_else(|| PortError::NotFound(format!("Namespace '{}' not found", name)))?
                .get("dimension");
        Ok(dimension as usize)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Vector Encoding and Similarity
//=========================================================================================

/// Encodes a vector as little-endian f32 bytes for a BYTEA column.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes a BYTEA column back into an f32 vector.
pub fn decode_vector(bytes: &[u8]) -> PortResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(PortError::Unexpected(
            "Stored embedding has a truncated byte length".to_string(),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine similarity of two equal-length vectors. Zero-magnitude vectors
/// score 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(FromRow)]
struct EntryRecord {
    page: i32,
    content: String,
    embedding: Vec<u8>,
}

//=========================================================================================
// `VectorIndexService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VectorIndexService for PgVectorIndex {
    async fn create_namespace(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "INSERT INTO vector_namespaces (name, dimension, metric, status) \
             VALUES ($1, $2, $3, 'ready')",
        )
        .bind(name)
        .bind(dimension as i32)
        .bind(metric.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(namespace = name, dimension, "Created vector namespace");
                Ok(())
            }
            Err(e) => {
                let collision = e
                    .as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false);
                if collision {
                    Err(PortError::Conflict(format!(
                        "Namespace '{}' already exists",
                        name
                    )))
                } else {
                    Err(unexpected(e))
                }
            }
        }
    }

    async fn wait_ready(&self, name: &str, timeout: Duration) -> PortResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut delay = READY_POLL_INITIAL;

        loop {
            let status: Option<String> =
                sqlx::query("SELECT status FROM vector_namespaces WHERE name = $1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(unexpected)?
                    .map(|row| row.get("status"));

            match status.as_deref() {
                Some("ready") => return Ok(()),
                Some(other) => {
                    debug!(namespace = name, status = other, "Namespace not ready yet")
                }
                None => {
                    return Err(PortError::NotFound(format!(
                        "Namespace '{}' not found",
                        name
                    )))
                }
            }

            if tokio::time::Instant::now() + delay > deadline {
                warn!(namespace = name, "Namespace readiness poll timed out");
                return Err(PortError::IndexNotReady(name.to_string()));
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(READY_POLL_MAX);
        }
    }

    async fn upsert(&self, name: &str, entries: Vec<IndexEntry>) -> PortResult<()> {
        let dimension = self.namespace_dimension(name).await?;
        for entry in &entries {
            if entry.vector.len() != dimension {
                return Err(PortError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.vector.len(),
                });
            }
        }

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for entry in &entries {
            sqlx::query(
                "INSERT INTO vector_entries (namespace, page, content, embedding) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(name)
            .bind(entry.page as i32)
            .bind(&entry.text)
            .bind(encode_vector(&entry.vector))
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> PortResult<Vec<ScoredEntry>> {
        let dimension = self.namespace_dimension(name).await?;
        if vector.len() != dimension {
            return Err(PortError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        let records = sqlx::query_as::<_, EntryRecord>(
            "SELECT page, content, embedding FROM vector_entries \
             WHERE namespace = $1 ORDER BY id ASC",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut scored = Vec::with_capacity(records.len());
        for record in records {
            let stored = decode_vector(&record.embedding)?;
            scored.push(ScoredEntry {
                score: cosine_similarity(vector, &stored),
                page: record.page as u32,
                text: record.content,
            });
        }

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_namespace(&self, name: &str) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("DELETE FROM vector_entries WHERE namespace = $1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM vector_namespaces WHERE name = $1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }
}
