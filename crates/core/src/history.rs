//! History store trait: the durable record of completed exchanges.
//!
//! One record per (user message, assistant response) pair, appended after a
//! successful generation and queried by recency. The store is external to
//! the in-memory session context: clearing a session does not touch it, and
//! it never feeds back into the context window.

use crate::error::HistoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted exchange. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Row id assigned by the store
    pub id: i64,

    /// What the user sent
    pub user_message: String,

    /// What the model replied
    pub assistant_response: String,

    /// When the exchange completed
    pub timestamp: DateTime<Utc>,

    /// Which session the exchange belongs to
    pub session_id: String,
}

/// The history store trait.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite").
    fn name(&self) -> &str;

    /// Append one completed exchange; returns the assigned row id.
    async fn record(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_response: &str,
    ) -> std::result::Result<i64, HistoryError>;

    /// The most recent `limit` exchanges for a session, newest first.
    /// Unknown sessions yield an empty list.
    async fn recent(
        &self,
        session_id: &str,
        limit: u32,
    ) -> std::result::Result<Vec<HistoryRecord>, HistoryError>;

    /// Total recorded exchanges for a session.
    async fn count(&self, session_id: &str) -> std::result::Result<u64, HistoryError>;
}
