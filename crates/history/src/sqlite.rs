//! SQLite history store.
//!
//! A single `chat_history` table, one row per completed exchange, indexed by
//! session. Timestamps are stored as RFC 3339 text.

use async_trait::async_trait;
use chrono::Utc;
use confab_core::error::HistoryError;
use confab_core::history::{HistoryRecord, HistoryStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// Durable chat history backed by SQLite.
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn new(path: &str) -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| HistoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to ":memory:" opens its own private database, so
        // an in-memory store must never grow past one pooled connection.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite history store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations, creating the table and index if missing.
    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id         TEXT NOT NULL DEFAULT 'default',
                user_message       TEXT NOT NULL,
                assistant_response TEXT NOT NULL,
                timestamp          TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("chat_history table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_history_session ON chat_history(session_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("session index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `HistoryRecord` from a SQLite row.
    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<HistoryRecord, HistoryError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| HistoryError::QueryFailed(format!("id column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| HistoryError::QueryFailed(format!("session_id column: {e}")))?;
        let user_message: String = row
            .try_get("user_message")
            .map_err(|e| HistoryError::QueryFailed(format!("user_message column: {e}")))?;
        let assistant_response: String = row
            .try_get("assistant_response")
            .map_err(|e| HistoryError::QueryFailed(format!("assistant_response column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| HistoryError::QueryFailed(format!("timestamp column: {e}")))?;

        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(HistoryRecord {
            id,
            user_message,
            assistant_response,
            timestamp,
            session_id,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_response: &str,
    ) -> Result<i64, HistoryError> {
        let timestamp = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO chat_history (session_id, user_message, assistant_response, timestamp)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(session_id)
        .bind(user_message)
        .bind(assistant_response)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("INSERT failed: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(session_id, id, "Recorded exchange");
        Ok(id)
    }

    async fn recent(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        // id breaks ties between rows written within the same second
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, user_message, assistant_response, timestamp
            FROM chat_history
            WHERE session_id = ?1
            ORDER BY timestamp DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::QueryFailed(format!("recent: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn count(&self, session_id: &str) -> Result<u64, HistoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM chat_history WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| HistoryError::QueryFailed(format!("COUNT: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| HistoryError::QueryFailed(format!("cnt column: {e}")))?;

        Ok(cnt as u64)
    }
}
