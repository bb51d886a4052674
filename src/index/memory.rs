//! In-memory embedding index.
//!
//! Useful for testing and small corpora. Same generational semantics as the
//! SQLite backend: the new generation is assembled off to the side and
//! swapped in under the write lock.

use super::{
    sort_scored, CancelFlag, CollectionInfo, EmbeddingIndex, RebuildReport, Scored,
    cosine_similarity,
};
use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{AvisaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct Generation {
    embedder_fingerprint: String,
    built_at: DateTime<Utc>,
    documents: Vec<(Chunk, Vec<f32>)>,
}

/// In-memory embedding index.
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Generation>>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl MemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            embedder,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingIndex for MemoryIndex {
    async fn rebuild(
        &self,
        collection: &str,
        chunks: &[Chunk],
        cancel: &CancelFlag,
    ) -> Result<RebuildReport> {
        let mut documents = Vec::with_capacity(chunks.len());
        let mut batches = 0;

        for batch in chunks.chunks(self.batch_size) {
            cancel.check()?;

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            documents.extend(batch.iter().cloned().zip(embeddings));
            batches += 1;
        }

        let generation = Generation {
            embedder_fingerprint: self.embedder.fingerprint(),
            built_at: Utc::now(),
            documents,
        };

        let mut collections = self.collections.write().unwrap();
        collections.insert(collection.to_string(), generation);

        Ok(RebuildReport {
            collection: collection.to_string(),
            chunks_indexed: chunks.len(),
            batches,
        })
    }

    async fn query(&self, collection: &str, text: &str, top_k: usize) -> Result<Vec<Scored>> {
        {
            let collections = self.collections.read().unwrap();
            let generation = collections
                .get(collection)
                .ok_or_else(|| AvisaError::CollectionNotFound(collection.to_string()))?;

            if generation.embedder_fingerprint != self.embedder.fingerprint() {
                return Err(AvisaError::EmbeddingSpaceMismatch {
                    built_with: generation.embedder_fingerprint.clone(),
                    query_with: self.embedder.fingerprint(),
                });
            }
        }

        let query_embedding = self.embedder.embed(text).await?;

        let collections = self.collections.read().unwrap();
        let generation = collections
            .get(collection)
            .ok_or_else(|| AvisaError::CollectionNotFound(collection.to_string()))?;

        let mut results: Vec<Scored> = generation
            .documents
            .iter()
            .map(|(chunk, embedding)| Scored {
                score: cosine_similarity(&query_embedding, embedding),
                chunk: chunk.clone(),
            })
            .collect();

        sort_scored(&mut results);
        results.truncate(top_k);
        Ok(results)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read().unwrap();
        let mut infos: Vec<CollectionInfo> = collections
            .iter()
            .map(|(name, generation)| CollectionInfo {
                name: name.clone(),
                chunk_count: generation.documents.len(),
                embedder_fingerprint: generation.embedder_fingerprint.clone(),
                built_at: generation.built_at,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}
