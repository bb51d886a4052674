//! Embedding generation for semantic search and retrieval.

mod mock;
mod openai;

pub use mock::MockEmbedder;
pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
///
/// The fingerprint identifies the embedding space. Vectors from different
/// fingerprints are not comparable; the index stores the build-time
/// fingerprint and refuses queries from a different one.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Stable identity of the embedding space (provider/model/dimensions).
    fn fingerprint(&self) -> String;
}
