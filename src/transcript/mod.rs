//! Transcript data model and source abstraction.

pub mod source;

pub use source::{TranscriptSource, YoutubeTranscriptSource};

use crate::error::{AvisaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a video whose transcript can be fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMeta {
    /// Video ID.
    pub video_id: String,
    /// Channel name or handle.
    pub channel: String,
    /// Video title.
    pub title: String,
    /// When the video was published.
    pub published_at: Option<DateTime<Utc>>,
    /// Watch URL.
    pub url: String,
}

impl VideoMeta {
    /// Watch URL seeking to a given offset in seconds.
    pub fn url_at(&self, offset_seconds: u32) -> String {
        format!(
            "https://www.youtube.com/watch?v={}&t={}s",
            self.video_id, offset_seconds
        )
    }
}

/// A single timed segment of a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start offset from video origin, in seconds.
    pub start_seconds: f64,
    /// Segment duration in seconds.
    pub duration_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, duration_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            duration_seconds,
            text,
        }
    }

    /// End offset of this segment in seconds.
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }
}

/// A complete timestamped transcript for one video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// The video this transcript belongs to.
    pub video: VideoMeta,
    /// Ordered transcript segments.
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Create a transcript, validating segment ordering.
    ///
    /// Segments must be ordered by non-decreasing start offset; out-of-order
    /// input corrupts every chunk boundary downstream, so it fails fast.
    pub fn new(video: VideoMeta, segments: Vec<TranscriptSegment>) -> Result<Self> {
        for pair in segments.windows(2) {
            if pair[1].start_seconds < pair[0].start_seconds {
                return Err(AvisaError::MalformedInput(format!(
                    "transcript for {} has out-of-order segments ({}s after {}s)",
                    video.video_id, pair[1].start_seconds, pair[0].start_seconds
                )));
            }
        }
        Ok(Self { video, segments })
    }

    /// Full text content, segments joined with single spaces.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Total duration in seconds (end of the last segment).
    pub fn duration_seconds(&self) -> f64 {
        self.segments.last().map(|s| s.end_seconds()).unwrap_or(0.0)
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
