//! Conversation history persistence.
//!
//! The streaming path records each turn after the answer finishes; the
//! sink trait keeps that concern swappable so tests can observe writes
//! without a database.

use std::path::PathBuf;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub chat_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn append(
        &self,
        chat_id: &str,
        role: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ApiError>;
}

/// SQLite-backed sink, sharing the application database file.
pub struct SqliteChatSink {
    pool: SqlitePool,
}

impl SqliteChatSink {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_messages_chat ON chat_messages(chat_id)")
            .execute(&pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(Self { pool })
    }

    pub async fn messages(&self, chat_id: &str) -> Result<Vec<ChatTurn>, ApiError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT chat_id, role, content, created_at
             FROM chat_messages WHERE chat_id = ?1 ORDER BY id",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.into_iter()
            .map(|(chat_id, role, content, created_at)| {
                let timestamp = created_at
                    .parse::<DateTime<Utc>>()
                    .map_err(ApiError::internal)?;
                Ok(ChatTurn {
                    chat_id,
                    role,
                    content,
                    timestamp,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChatSink for SqliteChatSink {
    async fn append(
        &self,
        chat_id: &str,
        role: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO chat_messages (chat_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(chat_id)
        .bind(role)
        .bind(content)
        .bind(timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemoryChatSink {
    turns: StdMutex<Vec<ChatTurn>>,
}

impl MemoryChatSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns_for(&self, chat_id: &str) -> Vec<ChatTurn> {
        self.turns
            .lock()
            .map(|turns| {
                turns
                    .iter()
                    .filter(|t| t.chat_id == chat_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatSink for MemoryChatSink {
    async fn append(
        &self,
        chat_id: &str,
        role: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let mut turns = self.turns.lock().map_err(|_| {
            ApiError::Internal("chat sink mutex poisoned".to_string())
        })?;
        turns.push(ChatTurn {
            chat_id: chat_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            timestamp,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_sink_persists_turns_in_order() {
        let tmp =
            std::env::temp_dir().join(format!("docchat-history-test-{}.db", uuid::Uuid::new_v4()));
        let sink = SqliteChatSink::with_path(tmp).await.unwrap();

        let now = Utc::now();
        sink.append("chat-1", "user", "What color is grass?", now)
            .await
            .unwrap();
        sink.append("chat-1", "assistant", "Grass is green.", now)
            .await
            .unwrap();
        sink.append("chat-2", "user", "unrelated", now).await.unwrap();

        let turns = sink.messages("chat-1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[1].content, "Grass is green.");
    }

    #[tokio::test]
    async fn memory_sink_filters_by_chat() {
        let sink = MemoryChatSink::new();
        let now = Utc::now();
        sink.append("a", "user", "hi", now).await.unwrap();
        sink.append("b", "user", "yo", now).await.unwrap();

        assert_eq!(sink.turns_for("a").len(), 1);
        assert_eq!(sink.turns_for("b").len(), 1);
        assert!(sink.turns_for("c").is_empty());
    }
}
