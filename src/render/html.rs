//! HTML newsletter rendering.
//!
//! Produces a self-contained HTML document. The first occurrence of each
//! citation marker becomes an embedded player seeking to the cited timestamp;
//! later occurrences become superscript links.

use crate::synthesis::{Article, ArticleSegment, Citation, SegmentOutcome};
use crate::transcript::format_timestamp;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write;

/// Render an article as a complete HTML document.
pub fn render_html(article: &Article) -> String {
    let mut out = String::new();

    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.7; color: #1a1a1a; max-width: 860px; margin: 0 auto; padding: 24px; }}
header {{ border-bottom: 2px solid #444; padding-bottom: 16px; margin-bottom: 24px; }}
header h1 {{ margin-bottom: 4px; }}
.meta {{ color: #666; font-size: 0.9em; }}
.tag {{ display: inline-block; background: #eee; border-radius: 12px; padding: 2px 10px; margin-right: 6px; font-size: 0.85em; }}
section {{ margin-bottom: 32px; }}
.video-clip {{ margin: 16px 0; }}
.video-clip iframe {{ width: 100%; aspect-ratio: 16 / 9; border: 0; }}
.video-info {{ font-size: 0.85em; color: #555; }}
.citation-link {{ color: #4455cc; }}
.segment-failed {{ background: #fff3f3; border-left: 3px solid #cc4444; padding: 8px 12px; color: #772222; }}
footer {{ border-top: 1px solid #ccc; margin-top: 32px; padding-top: 12px; color: #777; font-size: 0.85em; }}
</style>
</head>
<body>
<header>
<h1>{title}</h1>
<div class="meta">Generated on {date}</div>
<div>{tags}</div>
<div class="meta">{videos} videos cited &middot; {chunks} transcript chunks</div>
</header>
"#,
        title = escape(&article.title),
        date = article.generated_at.format("%Y-%m-%d %H:%M UTC"),
        tags = article
            .keywords
            .iter()
            .map(|k| format!(r#"<span class="tag">{}</span>"#, escape(k)))
            .collect::<Vec<_>>()
            .join(""),
        videos = article.cited_video_count(),
        chunks = article.source_count,
    );

    for segment in &article.segments {
        render_segment(&mut out, segment);
    }

    let _ = write!(
        out,
        "<footer>Generated from video transcripts by avisa.</footer>\n</body>\n</html>\n"
    );

    out
}

fn render_segment(out: &mut String, segment: &ArticleSegment) {
    let _ = write!(out, "<section>\n<h2>{}</h2>\n", escape(&segment.heading));

    match &segment.outcome {
        SegmentOutcome::Failed { reason } => {
            let _ = write!(
                out,
                r#"<p class="segment-failed">This section ("{}") could not be generated: {}</p>"#,
                escape(&segment.keyword),
                escape(reason)
            );
        }
        SegmentOutcome::Synthesized { prose, citations } => {
            let with_embeds = replace_markers(prose, citations);
            for paragraph in with_embeds.split("\n\n") {
                let paragraph = paragraph.trim();
                if paragraph.is_empty() {
                    continue;
                }
                if let Some(rest) = paragraph.strip_prefix("##") {
                    let _ = write!(out, "<h3>{}</h3>\n", escape(rest.trim_start_matches('#').trim()));
                } else if paragraph.starts_with("<div") {
                    let _ = write!(out, "{}\n", paragraph);
                } else {
                    let _ = write!(out, "<p>{}</p>\n", paragraph);
                }
            }
        }
    }

    let _ = write!(out, "</section>\n");
}

/// Replace `[n]` markers: first occurrence becomes an embedded player,
/// repeats become superscript links.
fn replace_markers(prose: &str, citations: &[Citation]) -> String {
    let marker_re = Regex::new(r"\[(\d+)\]").expect("Invalid regex");
    let mut embedded: HashSet<usize> = HashSet::new();

    // Escape first so generated prose cannot inject markup; markers survive
    // escaping untouched.
    let escaped = escape(prose);

    marker_re
        .replace_all(&escaped, |caps: &regex::Captures| {
            let marker: usize = match caps[1].parse() {
                Ok(m) => m,
                Err(_) => return caps[0].to_string(),
            };

            let Some(citation) = citations.iter().find(|c| c.marker == marker) else {
                // Dropped during synthesis (out of range): remove the marker.
                return String::new();
            };

            if embedded.insert(marker) {
                embed_block(citation)
            } else {
                format!(
                    r#"<sup class="citation-link"><a href="{}">[{}]</a></sup>"#,
                    citation.url, marker
                )
            }
        })
        .into_owned()
}

fn embed_block(citation: &Citation) -> String {
    format!(
        r#"<div class="video-clip" data-citation="{marker}">
<iframe loading="lazy" src="https://www.youtube.com/embed/{video_id}?start={start}" title="{title}" allowfullscreen></iframe>
<div class="video-info">{title} &middot; {channel} &middot; <a href="{url}">{timestamp}</a></div>
</div>"#,
        marker = citation.marker,
        video_id = citation.video_id,
        start = citation.timestamp_seconds as u32,
        title = escape(&citation.title),
        channel = escape(&citation.channel),
        url = citation.url,
        timestamp = format_timestamp(citation.timestamp_seconds),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn citation(marker: usize) -> Citation {
        Citation {
            marker,
            video_id: "vid00000001".to_string(),
            title: "Morning Brief".to_string(),
            channel: "Markets Daily".to_string(),
            timestamp_seconds: 90.0,
            excerpt: "excerpt".to_string(),
            url: "https://www.youtube.com/watch?v=vid00000001&t=90s".to_string(),
        }
    }

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
                    prose: "Strong quarter [1]. And again [1].".to_string(),
                    citations: vec![citation(1)],
                },
            }],
            source_count: 1,
        }
    }

    #[test]
    fn test_first_marker_embeds_later_markers_link() {
        let html = render_html(&article());
        assert_eq!(html.matches("<iframe").count(), 1);
        assert_eq!(html.matches("citation-link").count(), 2); // css class def + one sup
        assert!(html.contains("embed/vid00000001?start=90"));
    }

    #[test]
    fn test_failed_segment_rendered_with_reason() {
        let mut a = article();
        a.segments[0].outcome = SegmentOutcome::Failed {
            reason: "generation timeout".to_string(),
        };

        let html = render_html(&a);
        assert!(html.contains("segment-failed"));
        assert!(html.contains("generation timeout"));
    }

    #[test]
    fn test_prose_is_escaped() {
        let mut a = article();
        a.segments[0].outcome = SegmentOutcome::Synthesized {
            prose: "<script>alert(1)</script> [1]".to_string(),
            citations: vec![citation(1)],
        };

        let html = render_html(&a);
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
