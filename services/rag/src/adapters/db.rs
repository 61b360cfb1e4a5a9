//! services/rag/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` and `ConversationStore` ports from the `core` crate.
//! It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smartlearn_core::domain::{ChatMessage, Document, Page, QuizAttempt, Role};
use smartlearn_core::ports::{
    ConversationStore, DocumentStore, PortError, PortResult, VersionedHistory,
};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` and
/// `ConversationStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    index_namespace: String,
    ready: bool,
    created_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            index_namespace: self.index_namespace,
            ready: self.ready,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PageRecord {
    document_id: Uuid,
    page_number: i32,
    text: String,
    summary: Option<String>,
}
impl PageRecord {
    fn to_domain(self) -> Page {
        Page {
            document_id: self.document_id,
            page_number: self.page_number as u32,
            text: self.text,
            summary: self.summary,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        let role = match self.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => {
                return Err(PortError::Unexpected(format!(
                    "Unknown conversation role '{}' in database",
                    other
                )))
            }
        };
        Ok(ChatMessage {
            role,
            content: self.content,
            timestamp: self.created_at,
        })
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for DbAdapter {
    async fn create_document(
        &self,
        user_id: Uuid,
        title: &str,
        index_namespace: &str,
    ) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "INSERT INTO documents (id, user_id, title, index_namespace, ready) \
             VALUES ($1, $2, $3, $4, FALSE) \
             RETURNING id, user_id, title, index_namespace, ready, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(index_namespace)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, user_id, title, index_namespace, ready, created_at \
             FROM documents WHERE id = $1",
        )
        .bind(document_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Document {} not found", document_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn mark_ready(&self, document_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE documents SET ready = TRUE WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Document {} not found",
                document_id
            )));
        }
        Ok(())
    }

    async fn save_pages(&self, pages: &[Page]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for page in pages {
            sqlx::query(
                "INSERT INTO pages (document_id, page_number, text, summary) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(page.document_id)
            .bind(page.page_number as i32)
            .bind(&page.text)
            .bind(&page.summary)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn get_pages(&self, document_id: Uuid) -> PortResult<Vec<Page>> {
        let records = sqlx::query_as::<_, PageRecord>(
            "SELECT document_id, page_number, text, summary \
             FROM pages WHERE document_id = $1 ORDER BY page_number ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("DELETE FROM conversation_messages WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM conversations WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM quiz_attempts WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM pages WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn save_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
        let answers = serde_json::to_string(&attempt.answers)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(
            "INSERT INTO quiz_attempts (id, document_id, total_questions, score, answers, attempted_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(attempt.id)
        .bind(attempt.document_id)
        .bind(attempt.total_questions as i32)
        .bind(attempt.score.map(|s| s as i32))
        .bind(answers)
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn record_quiz_result(&self, attempt: &QuizAttempt) -> PortResult<()> {
        let answers = serde_json::to_string(&attempt.answers)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let result = sqlx::query("UPDATE quiz_attempts SET score = $2, answers = $3 WHERE id = $1")
            .bind(attempt.id)
            .bind(attempt.score.map(|s| s as i32))
            .bind(answers)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Quiz attempt {} not found",
                attempt.id
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `ConversationStore` Trait Implementation
//=========================================================================================
//
// The log is guarded by a per-document version counter. `append_turn` bumps
// the counter with `WHERE version = expected`, so two interleaved turns can
// never both extend the same snapshot: the loser sees `Conflict` and retries
// against the fresh history.

#[async_trait]
impl ConversationStore for DbAdapter {
    async fn history(&self, document_id: Uuid) -> PortResult<VersionedHistory> {
        let version: Option<i64> =
            sqlx::query("SELECT version FROM conversations WHERE document_id = $1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?
                .map(|row| row.get("version"));

        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT role, content, created_at FROM conversation_messages \
             WHERE document_id = $1 ORDER BY seq ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let messages = records
            .into_iter()
            .map(|r| r.to_domain())
            .collect::<PortResult<Vec<_>>>()?;

        Ok(VersionedHistory {
            version: version.unwrap_or(0) as u64,
            messages,
        })
    }

    async fn append_turn(
        &self,
        document_id: Uuid,
        expected_version: u64,
        user_message: ChatMessage,
        assistant_message: ChatMessage,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let bumped = sqlx::query(
            "UPDATE conversations SET version = version + 1 \
             WHERE document_id = $1 AND version = $2",
        )
        .bind(document_id)
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        if bumped.rows_affected() == 0 {
            // First turn for the document, or a lost race.
            if expected_version != 0 {
                return Err(PortError::Conflict(format!(
                    "Conversation for document {} moved past version {}",
                    document_id, expected_version
                )));
            }
            let created = sqlx::query(
                "INSERT INTO conversations (document_id, version) VALUES ($1, 1) \
                 ON CONFLICT (document_id) DO NOTHING",
            )
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            if created.rows_affected() == 0 {
                return Err(PortError::Conflict(format!(
                    "Conversation for document {} was created concurrently",
                    document_id
                )));
            }
        }

        let next_seq: i64 = sqlx::query(
            "SELECT COALESCE(MAX(seq), 0) AS seq FROM conversation_messages \
             WHERE document_id = $1",
        )
        .bind(document_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?
        .get("seq");

        for (offset, message) in [user_message, assistant_message].into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO conversation_messages (document_id, seq, role, content, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(document_id)
            .bind(next_seq + 1 + offset as i64)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(message.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        // Both messages land or neither does.
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn clear(&self, document_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("DELETE FROM conversation_messages WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO conversations (document_id, version) VALUES ($1, 1) \
             ON CONFLICT (document_id) DO UPDATE SET version = conversations.version + 1",
        )
        .bind(document_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }
}
