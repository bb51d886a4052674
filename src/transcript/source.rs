//! Transcript source implementations.
//!
//! A transcript source supplies video metadata and timestamped transcripts.
//! Failures for individual videos (private, captions disabled) are typed so
//! the pipeline can skip them and continue with the rest of a batch.

use super::{Transcript, TranscriptSegment, VideoMeta};
use crate::error::{AvisaError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use regex::Regex;
use tracing::{debug, warn};

/// Trait for transcript acquisition.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// List recent videos for a channel, newest first.
    async fn list_recent(
        &self,
        channel: &str,
        lookback_days: u32,
        max: usize,
    ) -> Result<Vec<VideoMeta>>;

    /// Fetch the timestamped transcript for one video.
    async fn fetch_transcript(&self, video: &VideoMeta) -> Result<Transcript>;
}

/// YouTube transcript source backed by yt-dlp.
pub struct YoutubeTranscriptSource {
    http: reqwest::Client,
    video_id_regex: Regex,
}

impl YoutubeTranscriptSource {
    pub fn new() -> Self {
        // Matches various YouTube URL formats and bare video IDs
        let video_id_regex = Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.)?
                (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex");

        Self {
            http: reqwest::Client::new(),
            video_id_regex,
        }
    }

    /// Extract video ID from a YouTube URL or bare ID.
    fn extract_video_id(&self, input: &str) -> Option<String> {
        let caps = self.video_id_regex.captures(input.trim())?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }

    /// Build the videos-page URL for a channel name or @handle.
    fn channel_url(channel: &str) -> String {
        if channel.starts_with('@') {
            format!("https://www.youtube.com/{}/videos", channel)
        } else {
            format!(
                "https://www.youtube.com/c/{}/videos",
                channel.replace(' ', "")
            )
        }
    }

    async fn run_ytdlp(&self, args: &[&str]) -> Result<std::process::Output> {
        tokio::process::Command::new("yt-dlp")
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AvisaError::ToolNotFound("yt-dlp".to_string())
                } else {
                    AvisaError::InvalidInput(format!("Failed to run yt-dlp: {}", e))
                }
            })
    }

    /// Fetch full metadata for one video via yt-dlp.
    async fn fetch_metadata(&self, video_id: &str, channel: &str) -> Result<serde_json::Value> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let output = self
            .run_ytdlp(&["--dump-json", "--no-download", "--no-warnings", &url])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AvisaError::TranscriptUnavailable {
                video_id: video_id.to_string(),
                reason: format!("metadata fetch failed for channel {}: {}", channel, stderr),
            });
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&json_str).map_err(|e| AvisaError::TranscriptUnavailable {
            video_id: video_id.to_string(),
            reason: format!("unparseable yt-dlp output: {}", e),
        })
    }

    fn meta_from_json(json: &serde_json::Value, video_id: &str, channel: &str) -> VideoMeta {
        let title = json["title"]
            .as_str()
            .unwrap_or("Unknown Title")
            .to_string();

        let channel_name = json["channel"]
            .as_str()
            .or_else(|| json["uploader"].as_str())
            .unwrap_or(channel)
            .to_string();

        let published_at = json["upload_date"].as_str().and_then(|date_str| {
            // yt-dlp returns date as YYYYMMDD
            if date_str.len() == 8 {
                chrono::NaiveDate::parse_from_str(date_str, "%Y%m%d")
                    .ok()
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc())
            } else {
                None
            }
        });

        VideoMeta {
            video_id: video_id.to_string(),
            channel: channel_name,
            title,
            published_at,
            url: format!("https://www.youtube.com/watch?v={}", video_id),
        }
    }

    /// Pick a caption track URL in json3 format, manual captions first.
    fn caption_url(json: &serde_json::Value) -> Option<String> {
        for field in ["subtitles", "automatic_captions"] {
            let Some(tracks) = json[field].as_object() else {
                continue;
            };

            // Prefer English variants, fall back to the first language listed
            let lang_entry = tracks
                .iter()
                .find(|(lang, _)| lang.starts_with("en"))
                .or_else(|| tracks.iter().next());

            let Some((_, formats)) = lang_entry else {
                continue;
            };

            if let Some(url) = formats
                .as_array()
                .and_then(|formats| {
                    formats
                        .iter()
                        .find(|f| f["ext"].as_str() == Some("json3"))
                })
                .and_then(|f| f["url"].as_str())
            {
                return Some(url.to_string());
            }
        }
        None
    }

    /// Parse a json3 caption document into transcript segments.
    fn parse_json3(doc: &serde_json::Value) -> Vec<TranscriptSegment> {
        let mut segments = Vec::new();

        let events = match doc["events"].as_array() {
            Some(events) => events,
            None => return segments,
        };

        for event in events {
            let text: String = event["segs"]
                .as_array()
                .map(|segs| {
                    segs.iter()
                        .filter_map(|s| s["utf8"].as_str())
                        .collect::<String>()
                })
                .unwrap_or_default();

            let text = text.replace('\n', " ").trim().to_string();
            if text.is_empty() {
                continue;
            }

            let start = event["tStartMs"].as_f64().unwrap_or(0.0) / 1000.0;
            let duration = event["dDurationMs"].as_f64().unwrap_or(0.0) / 1000.0;
            segments.push(TranscriptSegment::new(start, duration, text));
        }

        segments
    }
}

impl Default for YoutubeTranscriptSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptSource for YoutubeTranscriptSource {
    async fn list_recent(
        &self,
        channel: &str,
        lookback_days: u32,
        max: usize,
    ) -> Result<Vec<VideoMeta>> {
        let url = Self::channel_url(channel);
        // Over-fetch the flat listing; entries older than the cutoff are
        // filtered out after their full metadata is known.
        let fetch_cap = (max * 3).max(10).to_string();

        let output = self
            .run_ytdlp(&[
                "--dump-json",
                "--no-download",
                "--no-warnings",
                "--flat-playlist",
                "--playlist-end",
                &fetch_cap,
                &url,
            ])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AvisaError::InvalidInput(format!(
                "Failed to list videos for channel {}: {}",
                channel, stderr
            )));
        }

        let cutoff = Utc::now() - Duration::days(lookback_days as i64);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut videos = Vec::new();

        for line in stdout.lines() {
            if videos.len() >= max {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let entry: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(_) => continue,
            };

            let id = entry["id"]
                .as_str()
                .or_else(|| entry["url"].as_str())
                .and_then(|s| self.extract_video_id(s).or_else(|| Some(s.to_string())));

            let Some(video_id) = id else { continue };

            // Flat playlist entries carry no upload date; resolve it per video.
            match self.fetch_metadata(&video_id, channel).await {
                Ok(json) => {
                    let meta = Self::meta_from_json(&json, &video_id, channel);
                    match meta.published_at {
                        Some(published) if published >= cutoff => {
                            debug!("Channel {}: keeping {} ({})", channel, video_id, meta.title);
                            videos.push(meta);
                        }
                        _ => debug!("Channel {}: {} outside lookback window", channel, video_id),
                    }
                }
                Err(e) => {
                    warn!("Channel {}: skipping {}: {}", channel, video_id, e);
                }
            }
        }

        Ok(videos)
    }

    async fn fetch_transcript(&self, video: &VideoMeta) -> Result<Transcript> {
        let json = self.fetch_metadata(&video.video_id, &video.channel).await?;

        let caption_url =
            Self::caption_url(&json).ok_or_else(|| AvisaError::TranscriptUnavailable {
                video_id: video.video_id.clone(),
                reason: "no caption track available".to_string(),
            })?;

        let doc: serde_json::Value = self
            .http
            .get(&caption_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AvisaError::TranscriptUnavailable {
                video_id: video.video_id.clone(),
                reason: format!("caption download failed: {}", e),
            })?
            .json()
            .await?;

        let segments = Self::parse_json3(&doc);
        if segments.is_empty() {
            return Err(AvisaError::TranscriptUnavailable {
                video_id: video.video_id.clone(),
                reason: "caption track is empty".to_string(),
            });
        }

        Transcript::new(video.clone(), segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        let source = YoutubeTranscriptSource::new();

        assert_eq!(
            source.extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            source.extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            source.extract_video_id("dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(source.extract_video_id("not-a-video-id"), None);
    }

    #[test]
    fn test_channel_url() {
        assert_eq!(
            YoutubeTranscriptSource::channel_url("@somehandle"),
            "https://www.youtube.com/@somehandle/videos"
        );
        assert_eq!(
            YoutubeTranscriptSource::channel_url("Some Channel"),
            "https://www.youtube.com/c/SomeChannel/videos"
        );
    }

    #[test]
    fn test_caption_url_falls_back_to_auto_captions() {
        let json = serde_json::json!({
            "subtitles": {},
            "automatic_captions": {
                "en": [
                    { "ext": "vtt", "url": "https://example.com/cap.vtt" },
                    { "ext": "json3", "url": "https://example.com/cap.json3" }
                ]
            }
        });

        assert_eq!(
            YoutubeTranscriptSource::caption_url(&json),
            Some("https://example.com/cap.json3".to_string())
        );
    }

    #[test]
    fn test_caption_url_none_when_no_tracks() {
        let json = serde_json::json!({ "title": "no captions here" });
        assert_eq!(YoutubeTranscriptSource::caption_url(&json), None);
    }

    #[test]
    fn test_parse_json3() {
        let doc = serde_json::json!({
            "events": [
                { "tStartMs": 0, "dDurationMs": 2000, "segs": [ {"utf8": "Hello "}, {"utf8": "world"} ] },
                { "tStartMs": 2000, "dDurationMs": 1500, "segs": [ {"utf8": "\n"} ] },
                { "tStartMs": 3500, "dDurationMs": 2500, "segs": [ {"utf8": "again"} ] }
            ]
        });

        let segments = YoutubeTranscriptSource::parse_json3(&doc);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world");
        assert_eq!(segments[0].start_seconds, 0.0);
        assert_eq!(segments[1].start_seconds, 3.5);
    }
}
