//! Session registry for built indexes
//!
//! Each upload produces a session handle that callers pass back on query,
//! replacing the process-wide "current index" of earlier designs. Indexes
//! are held behind `Arc` and replaced wholesale: an in-flight search sees
//! either the fully-old or fully-new index, never a mixture.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::retrieval::ChunkIndex;

pub type SessionId = Uuid;

struct Session {
    index: Arc<ChunkIndex>,
    created_at: DateTime<Utc>,
}

/// Concurrent map of session handles to their indexes.
///
/// No eviction: sessions live for the process lifetime.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly built index under a new session handle.
    pub fn create(&self, index: ChunkIndex) -> (SessionId, DateTime<Utc>) {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        info!("Created session {} ({} chunks)", id, index.len());
        self.sessions.insert(
            id,
            Session {
                index: Arc::new(index),
                created_at,
            },
        );
        (id, created_at)
    }

    /// Replace a session's index wholesale. Returns the session creation
    /// time, or `None` when the session is unknown.
    pub fn replace(&self, id: SessionId, index: ChunkIndex) -> Option<DateTime<Utc>> {
        let mut entry = self.sessions.get_mut(&id)?;
        info!("Replaced index for session {} ({} chunks)", id, index.len());
        entry.index = Arc::new(index);
        Some(entry.created_at)
    }

    /// Snapshot of a session's current index, if the session exists.
    pub fn get(&self, id: &SessionId) -> Option<Arc<ChunkIndex>> {
        self.sessions.get(id).map(|s| s.index.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::retrieval::Embedder;
    use async_trait::async_trait;

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }
    }

    async fn build(chunks: &[&str]) -> ChunkIndex {
        ChunkIndex::build(
            &UnitEmbedder,
            chunks.iter().map(|s| s.to_string()).collect(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_session_is_none() {
        let store = SessionStore::new();
        assert!(store.get(&Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::new();
        let (id, _) = store.create(build(&["a", "bb"]).await);
        let index = store.get(&id).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = SessionStore::new();
        let (first, _) = store.create(build(&["one"]).await);
        let (second, _) = store.create(build(&["uno", "dos", "tres"]).await);

        assert_eq!(store.get(&first).unwrap().len(), 1);
        assert_eq!(store.get(&second).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_replace_swaps_wholesale() {
        let store = SessionStore::new();
        let (id, created) = store.create(build(&["old"]).await);

        // A snapshot taken before the swap keeps seeing the old index.
        let before = store.get(&id).unwrap();

        let replaced_at = store.replace(id, build(&["new", "er"]).await).unwrap();
        assert_eq!(replaced_at, created);

        assert_eq!(before.len(), 1);
        assert_eq!(store.get(&id).unwrap().len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_unknown_session() {
        let store = SessionStore::new();
        assert!(store.replace(Uuid::new_v4(), build(&["x"]).await).is_none());
    }
}
