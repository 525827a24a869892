//! In-memory embedding index with exact nearest-neighbor search
//!
//! Chunks and their embeddings are stored in parallel vectors and compared
//! in single-precision floating point using squared Euclidean distance.
//! Equidistant chunks rank in original chunk order (stable sort).

use tracing::debug;

use crate::error::{Result, ServiceError};
use crate::retrieval::Embedder;

/// Immutable index over one document's chunks.
///
/// Built once per upload; replacing a document means building a fresh index
/// and swapping the reference, never mutating in place.
pub struct ChunkIndex {
    chunks: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    dim: usize,
}

impl ChunkIndex {
    /// Embed `chunks` and build an index over them.
    ///
    /// Fails with `EmptyInput` when there is nothing to index. The embedding
    /// dimension is fixed by the first returned vector; any disagreement
    /// within the batch is a `DimensionMismatch`.
    pub async fn build(embedder: &dyn Embedder, chunks: Vec<String>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(ServiceError::EmptyInput("no chunks to index".to_string()));
        }

        let embeddings = embedder.embed_batch(&chunks).await?;

        if embeddings.len() != chunks.len() {
            return Err(ServiceError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dim = embeddings[0].len();
        if dim == 0 {
            return Err(ServiceError::InvalidResponse(
                "embedding model returned a zero-dimension vector".to_string(),
            ));
        }
        for embedding in &embeddings {
            if embedding.len() != dim {
                return Err(ServiceError::DimensionMismatch {
                    expected: dim,
                    actual: embedding.len(),
                });
            }
        }

        debug!("Built index: {} chunks, dim {}", chunks.len(), dim);

        Ok(Self {
            chunks,
            embeddings,
            dim,
        })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding dimension of this index.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return at most `top_k` chunk texts nearest to `query`, nearest first.
    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<String>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = embedder
            .embed_batch(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ServiceError::InvalidResponse("no embedding returned for query".to_string())
            })?;

        if query_embedding.len() != self.dim {
            return Err(ServiceError::DimensionMismatch {
                expected: self.dim,
                actual: query_embedding.len(),
            });
        }

        Ok(self.rank(&query_embedding, top_k))
    }

    fn rank(&self, query: &[f32], top_k: usize) -> Vec<String> {
        let mut scored: Vec<(f32, usize)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (squared_l2(query, e), i))
            .collect();

        // Stable sort: equal distances keep original chunk order
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .filter_map(|(_, i)| self.chunks.get(i).cloned())
            .collect()
    }
}

/// Squared Euclidean distance over single-precision vectors.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic embedder: each text maps to a fixed 4-dim vector derived
    /// from its bytes.
    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| embed_one(t)).collect())
        }
    }

    fn embed_one(text: &str) -> Vec<f32> {
        let mut v = [0.0f32; 4];
        for (i, b) in text.bytes().enumerate() {
            v[i % 4] += b as f32 / 255.0;
        }
        v.to_vec()
    }

    /// Embedder that returns ragged dimensions.
    struct RaggedEmbedder;

    #[async_trait]
    impl Embedder for RaggedEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| vec![0.0; 3 + i])
                .collect())
        }
    }

    fn owned(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_build_empty_fails() {
        let result = ChunkIndex::build(&HashEmbedder, Vec::new()).await;
        assert!(matches!(result, Err(ServiceError::EmptyInput(_))));
    }

    #[tokio::test]
    async fn test_build_fixes_dimension() {
        let index = ChunkIndex::build(&HashEmbedder, owned(&["a b c", "d e f"]))
            .await
            .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dim(), 4);
    }

    #[tokio::test]
    async fn test_build_rejects_ragged_dimensions() {
        let result = ChunkIndex::build(&RaggedEmbedder, owned(&["a", "b"])).await;
        assert!(matches!(
            result,
            Err(ServiceError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }

    #[tokio::test]
    async fn test_exact_match_ranks_first() {
        let index = ChunkIndex::build(&HashEmbedder, owned(&["a b c", "d e f"]))
            .await
            .unwrap();
        let results = index.search(&HashEmbedder, "a b c", 1).await.unwrap();
        assert_eq!(results, vec!["a b c".to_string()]);
    }

    #[tokio::test]
    async fn test_top_k_caps_results() {
        let index = ChunkIndex::build(&HashEmbedder, owned(&["one", "two", "three", "four"]))
            .await
            .unwrap();
        let results = index.search(&HashEmbedder, "one", 2).await.unwrap();
        assert_eq!(results.len(), 2);

        // fewer than top_k when fewer chunks exist
        let results = index.search(&HashEmbedder, "one", 10).await.unwrap();
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_top_k_zero_returns_empty() {
        let index = ChunkIndex::build(&HashEmbedder, owned(&["one"])).await.unwrap();
        let results = index.search(&HashEmbedder, "one", 0).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_equidistant_ties_keep_chunk_order() {
        // Identical texts embed identically, so every distance ties.
        let index = ChunkIndex::build(&HashEmbedder, owned(&["same", "same", "same"]))
            .await
            .unwrap();
        let results = index.search(&HashEmbedder, "same", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        // All equal; stability is observable through repeated runs
        let again = index.search(&HashEmbedder, "same", 3).await.unwrap();
        assert_eq!(results, again);
    }

    #[tokio::test]
    async fn test_repeated_build_and_search_is_deterministic() {
        let chunks = owned(&["alpha beta", "gamma delta", "epsilon zeta"]);
        let a = ChunkIndex::build(&HashEmbedder, chunks.clone()).await.unwrap();
        let b = ChunkIndex::build(&HashEmbedder, chunks).await.unwrap();
        assert_eq!(
            a.search(&HashEmbedder, "gamma", 3).await.unwrap(),
            b.search(&HashEmbedder, "gamma", 3).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        struct WideEmbedder;

        #[async_trait]
        impl Embedder for WideEmbedder {
            async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
            }
        }

        let index = ChunkIndex::build(&HashEmbedder, owned(&["a"])).await.unwrap();
        let result = index.search(&WideEmbedder, "a", 1).await;
        assert!(matches!(
            result,
            Err(ServiceError::DimensionMismatch { expected: 4, actual: 8 })
        ));
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }
}
