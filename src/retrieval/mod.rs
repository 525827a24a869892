//! Retrieval core: chunking, embedding-backed indexing, and sessions
//!
//! A document is normalized, split into overlapping character windows by
//! [`chunker::chunk`], embedded one vector per chunk, and held in a
//! [`ChunkIndex`]. Indexes are owned by explicit session handles in a
//! [`SessionStore`] rather than process-wide mutable state, so concurrent
//! sessions are independent and replacing an index is an atomic reference
//! swap.

pub mod chunker;
pub mod index;
pub mod session;

pub use chunker::chunk;
pub use index::ChunkIndex;
pub use session::{SessionId, SessionStore};

use async_trait::async_trait;

use crate::error::Result;

/// Trait for embedding backends
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input text (in order).
    /// All vectors within a session share a fixed dimension.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
