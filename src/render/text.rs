//! Plain-text newsletter rendering.
//!
//! Produces a message-friendly text format with timestamped video links per
//! citation, plus a splitter for transports with a message length limit.

use crate::synthesis::{Article, SegmentOutcome};
use crate::transcript::format_timestamp;
use std::fmt::Write;

const DIVIDER: &str = "------------------------------";

/// Render an article as plain text with per-citation source links.
pub fn render_text(article: &Article) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", article.title);
    let _ = writeln!(out, "{}", DIVIDER);
    let _ = writeln!(
        out,
        "Generated {} | Topics: {}",
        article.generated_at.format("%Y-%m-%d"),
        article.keywords.join(", ")
    );

    for segment in &article.segments {
        let _ = writeln!(out, "\n{}", DIVIDER);
        let _ = writeln!(out, "{}", segment.heading);

        match &segment.outcome {
            SegmentOutcome::Failed { reason } => {
                let _ = writeln!(
                    out,
                    "(section '{}' could not be generated: {})",
                    segment.keyword, reason
                );
            }
            SegmentOutcome::Synthesized { prose, citations } => {
                let _ = writeln!(out, "\n{}", prose.trim());

                if !citations.is_empty() {
                    let _ = writeln!(out, "\nSources:");
                    for citation in citations {
                        let _ = writeln!(
                            out,
                            "[{}] {} - {} @ {}\n    {}",
                            citation.marker,
                            citation.title,
                            citation.channel,
                            format_timestamp(citation.timestamp_seconds),
                            citation.url
                        );
                    }
                }
            }
        }
    }

    out
}

/// Split a rendered message into transport-sized parts.
///
/// Splits at section dividers first; a section longer than the limit is
/// hard-split at line boundaries.
pub fn split_message(message: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(1);
    let mut sections: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in message.lines() {
        let is_divider = line == DIVIDER;
        if is_divider && !current.trim().is_empty() {
            sections.push(current.trim_end().to_string());
            current = String::new();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current.trim_end().to_string());
    }

    // Pack sections into parts up to the limit.
    let mut parts: Vec<String> = Vec::new();
    let mut part = String::new();

    for section in sections {
        for piece in hard_split(&section, max_length) {
            if !part.is_empty() && part.len() + piece.len() + 1 > max_length {
                parts.push(part.trim_end().to_string());
                part = String::new();
            }
            if !part.is_empty() {
                part.push('\n');
            }
            part.push_str(&piece);
        }
    }
    if !part.trim().is_empty() {
        parts.push(part.trim_end().to_string());
    }

    parts
}

/// Split one section at line boundaries so no piece exceeds the limit.
fn hard_split(section: &str, max_length: usize) -> Vec<String> {
    if section.len() <= max_length {
        return vec![section.to_string()];
    }

    let mut pieces = Vec::new();
    let mut piece = String::new();

    for line in section.lines() {
        if !piece.is_empty() && piece.len() + line.len() + 1 > max_length {
            pieces.push(piece.trim_end().to_string());
            piece = String::new();
        }
        if !piece.is_empty() {
            piece.push('\n');
        }
        // A single line longer than the limit is passed through whole rather
        // than broken mid-URL.
        piece.push_str(line);
    }
    if !piece.trim().is_empty() {
        pieces.push(piece.trim_end().to_string());
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::{ArticleSegment, Citation};
    use chrono::Utc;

    fn article() -> Article {
        Article {
            title: "News Digest: earnings".to_string(),
            language: "English".to_string(),
            generated_at: Utc::now(),
            keywords: vec!["earnings".to_string()],
            segments: vec![ArticleSegment {
                heading: "Earnings Watch".to_string(),
                keyword: "earnings".to_string(),
                outcome: SegmentOutcome::Synthesized {
                    prose: "Strong quarter [1].".to_string(),
                    citations: vec![Citation {
                        marker: 1,
                        video_id: "vid00000001".to_string(),
                        title: "Morning Brief".to_string(),
                        channel: "Markets Daily".to_string(),
                        timestamp_seconds: 90.0,
                        excerpt: "excerpt".to_string(),
                        url: "https://www.youtube.com/watch?v=vid00000001&t=90s".to_string(),
                    }],
                },
            }],
            source_count: 1,
        }
    }

    #[test]
    fn test_render_includes_timestamped_link() {
        let text = render_text(&article());
        assert!(text.contains("Earnings Watch"));
        assert!(text.contains("@ 01:30"));
        assert!(text.contains("&t=90s"));
    }

    #[test]
    fn test_failed_segment_noted() {
        let mut a = article();
        a.segments[0].outcome = SegmentOutcome::Failed {
            reason: "timeout".to_string(),
        };
        let text = render_text(&a);
        assert!(text.contains("could not be generated: timeout"));
    }

    #[test]
    fn test_split_message_respects_limit() {
        let message = (0..50)
            .map(|i| format!("line number {}", i))
            .collect::<Vec<_>>()
            .join("\n");

        let parts = split_message(&message, 200);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.len() <= 200);
        }
    }

    #[test]
    fn test_split_short_message_is_single_part() {
        let parts = split_message("short message", 1500);
        assert_eq!(parts.len(), 1);
    }
}
