//! Multi-keyword retrieval over the embedding index.
//!
//! For each keyword the index is queried independently; results are merged
//! into one deduplicated, deterministically ranked candidate set. This is the
//! "R" of the pipeline and is testable without any generation step.

use crate::chunking::Chunk;
use crate::error::{AvisaError, Result};
use crate::index::EmbeddingIndex;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A retrieved chunk with its score and originating keyword.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Chunk,
    /// Best similarity score seen across keywords.
    pub score: f32,
    /// The keyword that produced this candidate's best score.
    pub keyword: String,
    /// Index of that keyword in the query list (tie-break order).
    pub keyword_index: usize,
}

/// Retriever over a named collection.
pub struct Retriever {
    index: Arc<dyn EmbeddingIndex>,
    collection: String,
    top_k_per_keyword: usize,
    max_concurrent_queries: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(index: Arc<dyn EmbeddingIndex>, collection: &str) -> Self {
        Self {
            index,
            collection: collection.to_string(),
            top_k_per_keyword: 10,
            max_concurrent_queries: 4,
            min_score: 0.0,
        }
    }

    /// Set how many chunks each keyword query fetches.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k_per_keyword = top_k;
        self
    }

    /// Cap concurrent keyword queries in flight.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_queries = max.max(1);
        self
    }

    /// Drop candidates scoring below this threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Retrieve candidates for all keywords.
    ///
    /// Queries fan out concurrently but the merged ordering is independent of
    /// completion order: candidates sort by score descending, ties broken by
    /// earliest keyword index, then chunk identity. A chunk found by several
    /// keywords appears once with its best score. One keyword failing does
    /// not fail the batch; errors that every keyword would hit identically
    /// (missing collection, wrong embedding space) abort immediately.
    #[instrument(skip(self), fields(keywords = keywords.len()))]
    pub async fn retrieve(&self, keywords: &[String]) -> Result<Vec<Candidate>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_results: Vec<(usize, &String, Result<Vec<crate::index::Scored>>)> =
            stream::iter(keywords.iter().enumerate())
                .map(|(i, keyword)| {
                    let index = self.index.clone();
                    let collection = self.collection.clone();
                    let top_k = self.top_k_per_keyword;
                    async move {
                        let result = index.query(&collection, keyword, top_k).await;
                        (i, keyword, result)
                    }
                })
                .buffer_unordered(self.max_concurrent_queries)
                .collect()
                .await;

        // Deterministic merge regardless of completion order.
        query_results.sort_by_key(|(i, _, _)| *i);

        let mut merged: HashMap<String, Candidate> = HashMap::new();
        let mut failed_keywords = 0;

        for (keyword_index, keyword, result) in query_results {
            let scored = match result {
                Ok(scored) => scored,
                Err(
                    e @ (AvisaError::CollectionNotFound(_)
                    | AvisaError::EmbeddingSpaceMismatch { .. }),
                ) => return Err(e),
                Err(e) => {
                    warn!("Keyword '{}' failed, continuing without it: {}", keyword, e);
                    failed_keywords += 1;
                    continue;
                }
            };

            for item in scored {
                if item.score < self.min_score {
                    continue;
                }

                let key = item.chunk.id();
                match merged.get_mut(&key) {
                    // Earlier keywords insert first, so a strict comparison
                    // gives equal scores to the earliest keyword index.
                    Some(existing) if existing.score >= item.score => {}
                    Some(existing) => {
                        existing.score = item.score;
                        existing.keyword = keyword.clone();
                        existing.keyword_index = keyword_index;
                    }
                    None => {
                        merged.insert(
                            key,
                            Candidate {
                                chunk: item.chunk,
                                score: item.score,
                                keyword: keyword.clone(),
                                keyword_index,
                            },
                        );
                    }
                }
            }
        }

        if failed_keywords == keywords.len() {
            return Err(AvisaError::Transient(format!(
                "all {} keyword queries failed",
                failed_keywords
            )));
        }

        let mut candidates: Vec<Candidate> = merged.into_values().collect();
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.keyword_index.cmp(&b.keyword_index))
                .then_with(|| a.chunk.id().cmp(&b.chunk.id()))
        });

        debug!(
            "Merged {} candidates from {} keywords ({} failed)",
            candidates.len(),
            keywords.len(),
            failed_keywords
        );

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AvisaError;
    use crate::index::{CancelFlag, CollectionInfo, RebuildReport, Scored};
    use async_trait::async_trait;

    fn chunk(video_id: &str, start: f64, text: &str) -> Chunk {
        Chunk {
            video_id: video_id.to_string(),
            channel: "Channel".to_string(),
            title: "Title".to_string(),
            start_offset: start,
            text: text.to_string(),
        }
    }

    /// Index stub returning canned per-keyword results.
    struct StubIndex {
        responses: HashMap<String, Vec<Scored>>,
        failing_keywords: Vec<String>,
    }

    impl StubIndex {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                failing_keywords: Vec::new(),
            }
        }

        fn respond(mut self, keyword: &str, results: Vec<(Chunk, f32)>) -> Self {
            self.responses.insert(
                keyword.to_string(),
                results
                    .into_iter()
                    .map(|(chunk, score)| Scored { chunk, score })
                    .collect(),
            );
            self
        }

        fn failing(mut self, keyword: &str) -> Self {
            self.failing_keywords.push(keyword.to_string());
            self
        }
    }

    #[async_trait]
    impl EmbeddingIndex for StubIndex {
        async fn rebuild(
            &self,
            _collection: &str,
            _chunks: &[Chunk],
            _cancel: &CancelFlag,
        ) -> Result<RebuildReport> {
            unimplemented!("stub")
        }

        async fn query(&self, _collection: &str, text: &str, top_k: usize) -> Result<Vec<Scored>> {
            if self.failing_keywords.iter().any(|k| k == text) {
                return Err(AvisaError::Transient("injected failure".to_string()));
            }
            let mut results = self.responses.get(text).cloned().unwrap_or_default();
            results.truncate(top_k);
            Ok(results)
        }

        async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
            Ok(Vec::new())
        }
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_no_duplicate_chunks() {
        let shared = chunk("v1", 0.0, "earnings and inflation");
        let stub = StubIndex::new()
            .respond("a", vec![(shared.clone(), 0.9)])
            .respond("b", vec![(shared.clone(), 0.95)]);

        let retriever = Retriever::new(Arc::new(stub), "news");
        let candidates = retriever.retrieve(&keywords(&["a", "b"])).await.unwrap();

        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_best_score_wins() {
        let shared = chunk("v1", 0.0, "earnings and inflation");
        let stub = StubIndex::new()
            .respond("a", vec![(shared.clone(), 0.9)])
            .respond("b", vec![(shared.clone(), 0.95)]);

        let retriever = Retriever::new(Arc::new(stub), "news");
        let candidates = retriever.retrieve(&keywords(&["a", "b"])).await.unwrap();

        assert!((candidates[0].score - 0.95).abs() < 1e-6);
        assert_eq!(candidates[0].keyword, "b");
    }

    #[tokio::test]
    async fn test_equal_scores_keep_earliest_keyword() {
        let shared = chunk("v1", 0.0, "shared");
        let stub = StubIndex::new()
            .respond("a", vec![(shared.clone(), 0.8)])
            .respond("b", vec![(shared.clone(), 0.8)]);

        let retriever = Retriever::new(Arc::new(stub), "news");
        let candidates = retriever.retrieve(&keywords(&["a", "b"])).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].keyword, "a");
        assert_eq!(candidates[0].keyword_index, 0);
    }

    #[tokio::test]
    async fn test_ordering_is_descending_score() {
        let stub = StubIndex::new()
            .respond(
                "a",
                vec![
                    (chunk("v1", 0.0, "weak match"), 0.3),
                    (chunk("v1", 60.0, "strong match"), 0.9),
                ],
            )
            .respond("b", vec![(chunk("v2", 0.0, "medium match"), 0.6)]);

        let retriever = Retriever::new(Arc::new(stub), "news");
        let candidates = retriever.retrieve(&keywords(&["a", "b"])).await.unwrap();

        let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.6, 0.3]);
    }

    #[tokio::test]
    async fn test_single_keyword_failure_is_not_fatal() {
        let stub = StubIndex::new()
            .respond("a", vec![(chunk("v1", 0.0, "good"), 0.9)])
            .failing("b");

        let retriever = Retriever::new(Arc::new(stub), "news");
        let candidates = retriever.retrieve(&keywords(&["a", "b"])).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].keyword, "a");
    }

    #[tokio::test]
    async fn test_all_keywords_failing_is_fatal() {
        let stub = StubIndex::new().failing("a").failing("b");

        let retriever = Retriever::new(Arc::new(stub), "news");
        let err = retriever.retrieve(&keywords(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, AvisaError::Transient(_)));
    }

    #[tokio::test]
    async fn test_missing_collection_aborts() {
        struct NotFoundIndex;

        #[async_trait]
        impl EmbeddingIndex for NotFoundIndex {
            async fn rebuild(
                &self,
                _collection: &str,
                _chunks: &[Chunk],
                _cancel: &CancelFlag,
            ) -> Result<RebuildReport> {
                unimplemented!("stub")
            }

            async fn query(
                &self,
                collection: &str,
                _text: &str,
                _top_k: usize,
            ) -> Result<Vec<Scored>> {
                Err(AvisaError::CollectionNotFound(collection.to_string()))
            }

            async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
                Ok(Vec::new())
            }
        }

        let retriever = Retriever::new(Arc::new(NotFoundIndex), "absent");
        let err = retriever.retrieve(&keywords(&["a"])).await.unwrap_err();
        assert!(matches!(err, AvisaError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_min_score_filters() {
        let stub = StubIndex::new().respond(
            "a",
            vec![
                (chunk("v1", 0.0, "strong"), 0.9),
                (chunk("v1", 60.0, "weak"), 0.1),
            ],
        );

        let retriever = Retriever::new(Arc::new(stub), "news").with_min_score(0.5);
        let candidates = retriever.retrieve(&keywords(&["a"])).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].chunk.start_offset, 0.0);
    }

    #[tokio::test]
    async fn test_empty_keywords_yield_empty() {
        let retriever = Retriever::new(Arc::new(StubIndex::new()), "news");
        let candidates = retriever.retrieve(&[]).await.unwrap();
        assert!(candidates.is_empty());
    }
}
