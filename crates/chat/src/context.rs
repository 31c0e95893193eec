//! The session context store.
//!
//! Owns the process-wide map from session id to ordered message list. This
//! is the only stateful logic in the system: sessions are created lazily,
//! live for the process lifetime, and are bounded by drop-oldest trimming.
//!
//! The lock guards the map for memory safety only and is never held across
//! an await point. Operations on the same session are not serialized against
//! each other: two concurrent requests for one session may interleave their
//! appends, which matches the reference behavior of the service.

use confab_core::message::{Message, SessionId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory map of session id → ordered messages.
///
/// Constructed once at startup and injected wherever session state is
/// needed; tests build isolated instances.
pub struct ContextStore {
    sessions: RwLock<HashMap<SessionId, Vec<Message>>>,
}

impl ContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Append a message to a session, creating the session if unknown.
    ///
    /// Empty content is permitted; there are no constraints on the message.
    pub async fn append(&self, session: &SessionId, message: Message) {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session.clone()).or_default().push(message);
    }

    /// Drop the oldest messages so at most `max_len` remain.
    ///
    /// Idempotent; a no-op for unknown sessions and for sequences already
    /// within the bound.
    pub async fn trim(&self, session: &SessionId, max_len: usize) {
        let mut sessions = self.sessions.write().await;
        if let Some(messages) = sessions.get_mut(session) {
            if messages.len() > max_len {
                let excess = messages.len() - max_len;
                messages.drain(..excess);
            }
        }
    }

    /// A snapshot of the session's current messages.
    ///
    /// Unknown sessions yield an empty list; mutating the returned vector
    /// never touches store state.
    pub async fn get(&self, session: &SessionId) -> Vec<Message> {
        let sessions = self.sessions.read().await;
        sessions.get(session).cloned().unwrap_or_default()
    }

    /// Reset a session to an empty sequence.
    ///
    /// Unknown sessions are not an error: the session ends up empty either
    /// way.
    pub async fn clear(&self, session: &SessionId) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.clone(), Vec::new());
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}
