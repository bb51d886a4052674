//! Fixed-window transcript chunking.
//!
//! Splits a transcript into time-bounded chunks that retain their source
//! video identity and start offset. Chunking is a pure transformation:
//! identical input always yields identical chunk boundaries.

use crate::error::{AvisaError, Result};
use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};

/// A time-bounded span of one video's transcript, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source video ID.
    pub video_id: String,
    /// Source channel name.
    pub channel: String,
    /// Source video title.
    pub title: String,
    /// Start offset from video origin, in seconds.
    pub start_offset: f64,
    /// Concatenated segment text.
    pub text: String,
}

impl Chunk {
    /// Stable identity for dedup: one chunk per (video, start offset).
    pub fn id(&self) -> String {
        format!("{}:{}", self.video_id, self.start_offset)
    }

    /// Watch URL seeking to this chunk's start offset.
    pub fn url(&self) -> String {
        format!(
            "https://www.youtube.com/watch?v={}&t={}s",
            self.video_id, self.start_offset as u32
        )
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Chunk window duration in seconds.
    pub window_seconds: u32,
    /// Trailing seconds replayed into the next chunk (0 = disjoint coverage).
    pub overlap_seconds: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            overlap_seconds: 0,
        }
    }
}

impl ChunkingConfig {
    fn validate(&self) -> Result<()> {
        if self.window_seconds == 0 {
            return Err(AvisaError::InvalidInput(
                "chunk window must be positive".to_string(),
            ));
        }
        if self.overlap_seconds >= self.window_seconds {
            return Err(AvisaError::InvalidInput(format!(
                "chunk overlap ({}s) must be smaller than the window ({}s)",
                self.overlap_seconds, self.window_seconds
            )));
        }
        Ok(())
    }
}

/// Split a transcript into fixed-window chunks.
///
/// Greedy accumulation: segments are appended until the elapsed duration from
/// the chunk's first segment reaches the window, then the chunk closes and the
/// next segment starts a fresh one. The final partial chunk is emitted if
/// non-empty. A single segment longer than the window becomes its own chunk,
/// unsplit.
pub fn chunk_transcript(transcript: &Transcript, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    // Transcript::new validates ordering, but corpora deserialized elsewhere
    // can reach here too. Corrupt boundaries corrupt every downstream result.
    for pair in transcript.segments.windows(2) {
        if pair[1].start_seconds < pair[0].start_seconds {
            return Err(AvisaError::MalformedInput(format!(
                "transcript for {} has out-of-order segments",
                transcript.video.video_id
            )));
        }
    }

    let window = config.window_seconds as f64;
    let overlap = config.overlap_seconds as f64;
    let video = &transcript.video;

    let mut chunks = Vec::new();
    // Indices into transcript.segments making up the open chunk.
    let mut current: Vec<usize> = Vec::new();
    // Highest segment index already emitted in some chunk.
    let mut emitted_through: Option<usize> = None;

    let close_chunk = |chunks: &mut Vec<Chunk>, indices: &[usize]| {
        let first = &transcript.segments[indices[0]];
        let text = indices
            .iter()
            .map(|&i| transcript.segments[i].text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        chunks.push(Chunk {
            video_id: video.video_id.clone(),
            channel: video.channel.clone(),
            title: video.title.clone(),
            start_offset: first.start_seconds,
            text,
        });
    };

    for (i, segment) in transcript.segments.iter().enumerate() {
        current.push(i);

        let chunk_start = transcript.segments[current[0]].start_seconds;
        if segment.end_seconds() - chunk_start >= window {
            close_chunk(&mut chunks, &current);
            emitted_through = Some(i);

            if overlap > 0.0 {
                // Replay trailing segments into the next chunk.
                let close_time = segment.end_seconds();
                let first = current[0];
                current.retain(|&j| {
                    j != first && transcript.segments[j].end_seconds() > close_time - overlap
                });
            } else {
                current.clear();
            }
        }
    }

    // No data loss at transcript end: emit the partial remainder, unless it
    // holds only replayed overlap segments.
    let has_unseen = current
        .iter()
        .any(|&j| emitted_through.is_none_or(|e| j > e));
    if !current.is_empty() && has_unseen {
        close_chunk(&mut chunks, &current);
    }

    Ok(chunks)
}
