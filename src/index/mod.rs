//! Vector index abstraction with named, rebuildable collections.
//!
//! Provides a trait-based interface for different index backends. A
//! collection is rebuilt wholesale: the build writes into a fresh staging
//! generation and swaps it in atomically, so queries never observe a
//! half-populated collection and a failed build leaves the previous
//! generation untouched.

mod memory;
mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use crate::chunking::Chunk;
use crate::error::{AvisaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A chunk returned from a query, with its similarity score.
#[derive(Debug, Clone)]
pub struct Scored {
    pub chunk: Chunk,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Result of a collection rebuild.
#[derive(Debug)]
pub struct RebuildReport {
    /// Collection name.
    pub collection: String,
    /// Number of chunks embedded and stored.
    pub chunks_indexed: usize,
    /// Number of embedding batches issued.
    pub batches: usize,
}

/// Summary information about a collection.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// Embedding space the collection was built with.
    pub embedder_fingerprint: String,
    /// When the live generation was built.
    pub built_at: DateTime<Utc>,
}

/// Cooperative cancellation flag, checked between batches and segments.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Error out if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AvisaError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Trait for embedding index implementations.
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Replace the collection's content with embeddings of the given chunks.
    ///
    /// Atomic from the caller's perspective: until the rebuild completes, the
    /// previous generation keeps serving queries; on failure or cancellation
    /// it stays in place. Callers must not run two rebuilds of the same
    /// collection concurrently (advisory single-writer; the pipeline holds a
    /// lock file for this).
    async fn rebuild(
        &self,
        collection: &str,
        chunks: &[Chunk],
        cancel: &CancelFlag,
    ) -> Result<RebuildReport>;

    /// Return up to `top_k` chunks nearest to the query text, best first.
    ///
    /// The query text is embedded with the same embedder the collection was
    /// built with; a fingerprint mismatch is an `EmbeddingSpaceMismatch`
    /// error, never a silent quality degradation. A missing collection is
    /// `CollectionNotFound`; an existing collection with no matches returns
    /// an empty vec.
    async fn query(&self, collection: &str, text: &str, top_k: usize) -> Result<Vec<Scored>>;

    /// List all live collections.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Deterministic result ordering: score descending, then chunk identity.
pub(crate) fn sort_scored(results: &mut [Scored]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.video_id.cmp(&b.chunk.video_id))
            .then_with(|| {
                a.chunk
                    .start_offset
                    .partial_cmp(&b.chunk.start_offset)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        assert!(flag.check().is_ok());

        let clone = flag.clone();
        clone.cancel();
        assert!(matches!(flag.check(), Err(AvisaError::Cancelled)));
    }
}
