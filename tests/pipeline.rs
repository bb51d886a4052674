//! End-to-end pipeline tests with mock providers.
//!
//! These exercise the chunk -> index -> retrieve -> synthesize flow with a
//! deterministic mock embedder and a scripted generator, suitable for CI.

use std::sync::Arc;

use avisa::chunking::{chunk_transcript, ChunkingConfig};
use avisa::embedding::MockEmbedder;
use avisa::error::Result;
use avisa::index::{CancelFlag, EmbeddingIndex, MemoryIndex, SqliteIndex};
use avisa::retrieval::Retriever;
use avisa::synthesis::{ArticleGenerator, SegmentOutcome, Synthesizer};
use avisa::transcript::{Transcript, TranscriptSegment, VideoMeta};
use async_trait::async_trait;

fn earnings_transcript() -> Transcript {
    let video = VideoMeta {
        video_id: "earn0000001".to_string(),
        channel: "Markets Daily".to_string(),
        title: "Earnings Special".to_string(),
        published_at: None,
        url: "https://www.youtube.com/watch?v=earn0000001".to_string(),
    };

    // Three 30-second segments at offsets 0, 30, 90, all about earnings.
    let segments = vec![
        TranscriptSegment::new(0.0, 30.0, "earnings season kicks off today".to_string()),
        TranscriptSegment::new(30.0, 30.0, "major banks report earnings beats".to_string()),
        TranscriptSegment::new(90.0, 30.0, "tech earnings guidance disappoints".to_string()),
    ];

    Transcript::new(video, segments).unwrap()
}

/// Generator that echoes a citation for every provided source.
struct CiteAllGenerator;

#[async_trait]
impl ArticleGenerator for CiteAllGenerator {
    async fn generate(&self, _system: &str, user: &str) -> Result<String> {
        // Count the numbered sources in the prompt and cite each once.
        let count = (1..)
            .take_while(|i| user.contains(&format!("[{}] Video:", i)))
            .count();

        let mut prose = String::from("## Roundup\n");
        for i in 1..=count {
            prose.push_str(&format!("Claim number {} is supported [{}]. ", i, i));
        }
        Ok(prose)
    }
}

#[tokio::test]
async fn test_end_to_end_earnings_scenario() {
    // Chunker: 60s window turns segments at 0/30/90 into chunks at 0 and 90.
    let transcript = earnings_transcript();
    let chunks = chunk_transcript(&transcript, &ChunkingConfig::default()).unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].start_offset, 0.0);
    assert_eq!(chunks[1].start_offset, 90.0);

    // Index with deterministic mock embeddings.
    let embedder = Arc::new(MockEmbedder::new());
    let index = Arc::new(MemoryIndex::new(embedder, 8));
    index
        .rebuild("newsletter", &chunks, &CancelFlag::new())
        .await
        .unwrap();

    // Retrieval for "earnings" finds both chunks.
    let retriever = Retriever::new(index.clone(), "newsletter").with_top_k(10);
    let candidates = retriever
        .retrieve(&["earnings".to_string()])
        .await
        .unwrap();

    assert_eq!(candidates.len(), 2);
    let mut offsets: Vec<f64> = candidates.iter().map(|c| c.chunk.start_offset).collect();
    offsets.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(offsets, vec![0.0, 90.0]);

    // Synthesis cites both chunks with their distinct timestamps.
    let synthesizer = Synthesizer::new(Arc::new(CiteAllGenerator));
    let article = synthesizer
        .synthesize(&candidates, "English", &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(article.segments.len(), 1);
    let SegmentOutcome::Synthesized { citations, .. } = &article.segments[0].outcome else {
        panic!("segment should be synthesized");
    };

    assert_eq!(citations.len(), 2);
    let mut cited: Vec<f64> = citations.iter().map(|c| c.timestamp_seconds).collect();
    cited.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(cited, vec![0.0, 90.0]);

    // Deep links seek to the exact supporting timestamp.
    assert!(citations
        .iter()
        .any(|c| c.url == "https://www.youtube.com/watch?v=earn0000001&t=90s"));
}

#[tokio::test]
async fn test_sqlite_round_trip_matches_memory() {
    let transcript = earnings_transcript();
    let chunks = chunk_transcript(&transcript, &ChunkingConfig::default()).unwrap();

    let mem_index = MemoryIndex::new(Arc::new(MockEmbedder::new()), 8);
    let sql_index = SqliteIndex::in_memory(Arc::new(MockEmbedder::new()), 8).unwrap();

    mem_index
        .rebuild("newsletter", &chunks, &CancelFlag::new())
        .await
        .unwrap();
    sql_index
        .rebuild("newsletter", &chunks, &CancelFlag::new())
        .await
        .unwrap();

    let from_memory = mem_index.query("newsletter", "earnings", 5).await.unwrap();
    let from_sqlite = sql_index.query("newsletter", "earnings", 5).await.unwrap();

    let ids = |results: &[avisa::index::Scored]| -> Vec<String> {
        results.iter().map(|s| s.chunk.id()).collect()
    };
    assert_eq!(ids(&from_memory), ids(&from_sqlite));
}

#[tokio::test]
async fn test_multi_keyword_merge_feeds_single_synthesis() {
    let video = VideoMeta {
        video_id: "mix00000001".to_string(),
        channel: "Macro Watch".to_string(),
        title: "Rates and Prices".to_string(),
        published_at: None,
        url: "https://www.youtube.com/watch?v=mix00000001".to_string(),
    };
    let transcript = Transcript::new(
        video,
        vec![
            TranscriptSegment::new(0.0, 60.0, "inflation data surprises markets".to_string()),
            TranscriptSegment::new(60.0, 60.0, "earnings and inflation both in focus".to_string()),
            TranscriptSegment::new(120.0, 60.0, "earnings outlook for the quarter".to_string()),
        ],
    )
    .unwrap();

    let chunks = chunk_transcript(&transcript, &ChunkingConfig::default()).unwrap();
    assert_eq!(chunks.len(), 3);

    let index = Arc::new(MemoryIndex::new(Arc::new(MockEmbedder::new()), 8));
    index
        .rebuild("newsletter", &chunks, &CancelFlag::new())
        .await
        .unwrap();

    let retriever = Retriever::new(index, "newsletter").with_top_k(3);
    let keywords = vec!["earnings".to_string(), "inflation".to_string()];
    let candidates = retriever.retrieve(&keywords).await.unwrap();

    // Chunks matched by both keywords must appear once.
    let mut ids: Vec<String> = candidates.iter().map(|c| c.chunk.id()).collect();
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before);

    let synthesizer = Synthesizer::new(Arc::new(CiteAllGenerator));
    let article = synthesizer
        .synthesize(&candidates, "English", &CancelFlag::new())
        .await
        .unwrap();

    // One segment per keyword that retrieved at least one candidate.
    assert!(!article.segments.is_empty());
    assert!(article.segments.len() <= keywords.len());
    assert!(article.is_usable());

    // Every citation points at a chunk from the candidate set.
    for segment in &article.segments {
        if let SegmentOutcome::Synthesized { citations, .. } = &segment.outcome {
            for citation in citations {
                assert!(candidates
                    .iter()
                    .any(|c| c.chunk.video_id == citation.video_id
                        && c.chunk.start_offset == citation.timestamp_seconds));
            }
        }
    }
}
