//! Append-only feedback persistence.
//!
//! Two backends: an in-memory store for tests and ephemeral runs, and a
//! SQLite store for durable deployments. Records are never updated or
//! deleted; the learning engine re-derives all aggregates from the full
//! sequence.

use std::str::FromStr;
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::models::{FeedbackKind, FeedbackRecord};

/// Durable sink and source for feedback records.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Append one record.
    async fn append(&self, record: &FeedbackRecord) -> Result<()>;

    /// All records, oldest first.
    async fn all(&self) -> Result<Vec<FeedbackRecord>>;
}

/// In-memory store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryFeedbackStore {
    records: RwLock<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<FeedbackRecord>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// SQLite-backed store, WAL journaled.
pub struct SqliteFeedbackStore {
    pool: SqlitePool,
}

impl SqliteFeedbackStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create feedback directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open feedback database: {}", path.display()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                session_id TEXT,
                response_fingerprint TEXT NOT NULL,
                kind TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create feedback table")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO feedback (id, user_id, session_id, response_fingerprint, kind, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.session_id)
        .bind(&record.response_fingerprint)
        .bind(record.kind.as_str())
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to append feedback record")?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<FeedbackRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, session_id, response_fingerprint, kind, recorded_at
             FROM feedback ORDER BY recorded_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load feedback records")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_str: String = row.get("kind");
            let kind = FeedbackKind::from_str(&kind_str)
                .map_err(|e| anyhow::anyhow!("corrupt feedback row: {}", e))?;
            let recorded_at: String = row.get("recorded_at");
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .context("corrupt feedback timestamp")?
                .with_timezone(&Utc);
            records.push(FeedbackRecord {
                id: row.get("id"),
                user_id: row.get("user_id"),
                session_id: row.get("session_id"),
                response_fingerprint: row.get("response_fingerprint"),
                kind,
                recorded_at,
            });
        }
        Ok(records)
    }
}
