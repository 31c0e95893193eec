//! In-memory history store for tests and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use confab_core::error::HistoryError;
use confab_core::history::{HistoryRecord, HistoryStore};
use tokio::sync::RwLock;

/// A history store that keeps records in a Vec, in insertion order.
pub struct InMemoryHistory {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn record(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_response: &str,
    ) -> Result<i64, HistoryError> {
        let mut records = self.records.write().await;
        let id = records.len() as i64 + 1;
        records.push(HistoryRecord {
            id,
            user_message: user_message.to_string(),
            assistant_response: assistant_response.to_string(),
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
        });
        Ok(id)
    }

    async fn recent(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.session_id == session_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, session_id: &str) -> Result<u64, HistoryError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.session_id == session_id).count() as u64)
    }
}
