//! SQLite-backed vector store implementation.
//!
//! In-process store using SQLite for collection metadata and entry
//! storage, with brute-force cosine similarity for search. No external
//! server required.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{DistanceMetric, IndexedEntry, ScoredFragment, VectorStore};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteVectorStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    /// Create with a custom path (for testing).
    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                metric TEXT NOT NULL,
                dimension INTEGER,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL,
                entry_id TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                UNIQUE(collection, entry_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Serialize embedding to bytes (little-endian f32).
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// Look up a collection's metric and pinned dimension, or
    /// `CollectionNotFound`. A stored metric this build does not know is
    /// surfaced rather than silently scored with the wrong function.
    async fn collection_info(
        &self,
        name: &str,
    ) -> Result<(DistanceMetric, Option<usize>), ApiError> {
        let row = sqlx::query("SELECT metric, dimension FROM collections WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?
            .ok_or_else(|| ApiError::CollectionNotFound(name.to_string()))?;

        let metric_str: String = row.get("metric");
        let metric = DistanceMetric::parse(&metric_str).ok_or_else(|| {
            ApiError::Internal(format!(
                "collection '{}' stores unknown metric '{}'",
                name, metric_str
            ))
        })?;
        let dimension: Option<i64> = row.get("dimension");
        Ok((metric, dimension.map(|d| d as usize)))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_or_replace_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM entries WHERE collection = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("INSERT INTO collections (name, metric) VALUES (?1, ?2)")
            .bind(name)
            .bind(metric.as_str())
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        tracing::debug!("Replaced collection '{}'", name);
        Ok(())
    }

    async fn add(&self, name: &str, entries: Vec<IndexedEntry>) -> Result<(), ApiError> {
        if entries.is_empty() {
            return Ok(());
        }

        // Validate every dimension before touching the table so a
        // mismatch anywhere in the batch writes nothing.
        let (_, pinned) = self.collection_info(name).await?;
        let expected = pinned.unwrap_or(entries[0].vector.len());
        for entry in &entries {
            if entry.vector.len() != expected {
                return Err(ApiError::DimensionMismatch {
                    expected,
                    actual: entry.vector.len(),
                });
            }
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for entry in &entries {
            let blob = Self::serialize_embedding(&entry.vector);
            let metadata_str = serde_json::to_string(&entry.metadata).unwrap_or_default();

            // ON CONFLICT UPDATE rather than INSERT OR REPLACE: the
            // original rowid survives, so insertion order stays the
            // deterministic tie-break after an overwrite.
            sqlx::query(
                "INSERT INTO entries (collection, entry_id, content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(collection, entry_id) DO UPDATE SET
                     content = excluded.content,
                     metadata = excluded.metadata,
                     embedding = excluded.embedding",
            )
            .bind(name)
            .bind(&entry.id)
            .bind(&entry.text)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        if pinned.is_none() {
            sqlx::query("UPDATE collections SET dimension = ?1 WHERE name = ?2")
                .bind(expected as i64)
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        tracing::debug!("Added {} entries to collection '{}'", entries.len(), name);
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredFragment>, ApiError> {
        let (metric, pinned) = self.collection_info(name).await?;

        let Some(expected) = pinned else {
            // Collection exists but holds no entries yet.
            return Ok(Vec::new());
        };
        if vector.len() != expected {
            return Err(ApiError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let rows = sqlx::query(
            "SELECT content, embedding FROM entries WHERE collection = ?1 ORDER BY rowid",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<ScoredFragment> = rows
            .iter()
            .map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let score = match metric {
                    DistanceMetric::Cosine => Self::cosine_similarity(vector, &stored),
                };
                ScoredFragment {
                    text: row.get("content"),
                    score,
                }
            })
            .collect();

        // Stable sort keeps rowid order among equal scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn delete_collection(&self, name: &str) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM entries WHERE collection = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize, ApiError> {
        self.collection_info(name).await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }
}
