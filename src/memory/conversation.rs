//! Per-session conversation memory
//!
//! Turns are appended in arrival order and never rewritten. Sessions are
//! strictly partitioned: nothing read for one session comes from another.

use crate::types::Turn;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct ConversationMemory {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one turn to a session, creating it on first use
    pub async fn append(&self, session_id: &str, turn: Turn) {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(turn);
    }

    /// Append a user turn and its reply under a single write lock
    ///
    /// Concurrent requests on one session cannot interleave between the pair.
    pub async fn append_exchange(&self, session_id: &str, user: Turn, assistant: Turn) {
        let mut sessions = self.sessions.write().await;
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(user);
        turns.push(assistant);
    }

    /// Last `limit` turns of a session, oldest first
    pub async fn recent(&self, session_id: &str, limit: usize) -> Vec<Turn> {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(turns) => {
                let start = turns.len().saturating_sub(limit);
                turns[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Known session ids, sorted
    pub async fn sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of turns stored for a session
    pub async fn len(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map_or(0, Vec::len)
    }

    /// Forget one session
    pub async fn clear(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TurnRole;

    #[tokio::test]
    async fn test_recent_returns_last_n_in_order() {
        let memory = ConversationMemory::new();
        for i in 0..5 {
            memory.append("s", Turn::user(format!("m{}", i))).await;
        }

        let recent = memory.recent("s", 3).await;
        let contents: Vec<&str> = recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_limit_larger_than_history() {
        let memory = ConversationMemory::new();
        memory.append("s", Turn::user("only")).await;
        assert_eq!(memory.recent("s", 10).await.len(), 1);
        assert!(memory.recent("s", 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let memory = ConversationMemory::new();
        assert!(memory.recent("nobody", 5).await.is_empty());
        assert_eq!(memory.len("nobody").await, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let memory = ConversationMemory::new();
        memory.append("a", Turn::user("from a")).await;
        memory.append("b", Turn::user("from b")).await;

        let a = memory.recent("a", 10).await;
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "from a");
        assert_eq!(memory.sessions().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_append_exchange_and_clear() {
        let memory = ConversationMemory::new();
        memory
            .append_exchange("s", Turn::user("hi"), Turn::assistant("hello"))
            .await;

        let turns = memory.recent("s", 10).await;
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].role, TurnRole::Assistant);

        memory.clear("s").await;
        assert_eq!(memory.len("s").await, 0);
        assert!(memory.sessions().await.is_empty());
    }
}
