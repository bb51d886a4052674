//! Newsletter synthesis with per-claim provenance.
//!
//! Candidates are grouped into topic segments (one per originating keyword,
//! in keyword order), each segment's prose is generated from a deterministic
//! numbered-source prompt, and `[n]` markers in the output are re-attached as
//! typed citations pointing at the exact chunk and timestamp. A citation can
//! only ever reference a chunk that was in the segment's source list.

mod generator;

pub use generator::{ArticleGenerator, OpenAIGenerator};

use crate::config::Prompts;
use crate::error::Result;
use crate::index::CancelFlag;
use crate::retrieval::Candidate;
use crate::transcript::format_timestamp;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A claim's source: the chunk and timestamp it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Marker number in the segment's prose (`[1]`, `[2]`, ...).
    pub marker: usize,
    /// Source video ID.
    pub video_id: String,
    /// Source video title.
    pub title: String,
    /// Source channel.
    pub channel: String,
    /// Chunk start offset in seconds.
    pub timestamp_seconds: f64,
    /// Short excerpt of the supporting chunk.
    pub excerpt: String,
    /// Watch URL seeking to the timestamp.
    pub url: String,
}

/// Result of synthesizing one topic segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SegmentOutcome {
    /// Prose with its citations.
    Synthesized {
        prose: String,
        citations: Vec<Citation>,
    },
    /// Generation failed; the rest of the article is unaffected.
    Failed { reason: String },
}

/// One topic segment of the article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSegment {
    /// Segment heading.
    pub heading: String,
    /// The keyword this segment covers.
    pub keyword: String,
    pub outcome: SegmentOutcome,
}

impl ArticleSegment {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SegmentOutcome::Failed { .. })
    }
}

/// A synthesized newsletter article. Immutable once handed to a renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub language: String,
    pub generated_at: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub segments: Vec<ArticleSegment>,
    /// Total candidate chunks that fed the article.
    pub source_count: usize,
}

impl Article {
    /// Whether at least one segment synthesized successfully.
    pub fn is_usable(&self) -> bool {
        self.segments.iter().any(|s| !s.is_failed())
    }

    /// Keywords whose segments failed.
    pub fn failed_keywords(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| s.is_failed())
            .map(|s| s.keyword.as_str())
            .collect()
    }

    /// Distinct videos cited across all segments.
    pub fn cited_video_count(&self) -> usize {
        let mut videos: Vec<&str> = self
            .segments
            .iter()
            .filter_map(|s| match &s.outcome {
                SegmentOutcome::Synthesized { citations, .. } => Some(citations),
                SegmentOutcome::Failed { .. } => None,
            })
            .flatten()
            .map(|c| c.video_id.as_str())
            .collect();
        videos.sort_unstable();
        videos.dedup();
        videos.len()
    }
}

/// Synthesizer: candidates in, article out.
pub struct Synthesizer {
    generator: Arc<dyn ArticleGenerator>,
    prompts: Prompts,
    max_sources_per_segment: usize,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn ArticleGenerator>) -> Self {
        Self {
            generator,
            prompts: Prompts::default(),
            max_sources_per_segment: 10,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Cap source chunks fed into one segment's prompt.
    pub fn with_max_sources(mut self, max: usize) -> Self {
        self.max_sources_per_segment = max.max(1);
        self
    }

    /// Synthesize an article from ranked candidates.
    ///
    /// Segments are produced in keyword order; a failed generation marks its
    /// segment failed and moves on. Cancellation is checked between segments,
    /// and a cancelled run returns an error rather than a partial article.
    #[instrument(skip(self, candidates, cancel), fields(candidates = candidates.len()))]
    pub async fn synthesize(
        &self,
        candidates: &[Candidate],
        target_language: &str,
        cancel: &CancelFlag,
    ) -> Result<Article> {
        let groups = group_by_keyword(candidates);
        let keywords: Vec<String> = groups.iter().map(|(k, _)| k.clone()).collect();

        let mut segments = Vec::with_capacity(groups.len());

        for (keyword, group) in &groups {
            cancel.check()?;

            let sources: Vec<&Candidate> = group
                .iter()
                .copied()
                .take(self.max_sources_per_segment)
                .collect();

            match self.synthesize_segment(keyword, &sources, target_language).await {
                Ok(segment) => segments.push(segment),
                Err(e) => {
                    warn!("Segment '{}' failed: {}", keyword, e);
                    segments.push(ArticleSegment {
                        heading: keyword.clone(),
                        keyword: keyword.clone(),
                        outcome: SegmentOutcome::Failed {
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }

        let article = Article {
            title: format!("News Digest: {}", keywords.join(", ")),
            language: target_language.to_string(),
            generated_at: Utc::now(),
            keywords,
            segments,
            source_count: candidates.len(),
        };

        info!(
            "Synthesized article: {} segments, {} failed",
            article.segments.len(),
            article.failed_keywords().len()
        );

        Ok(article)
    }

    async fn synthesize_segment(
        &self,
        keyword: &str,
        sources: &[&Candidate],
        target_language: &str,
    ) -> Result<ArticleSegment> {
        let user_prompt = self.build_segment_prompt(keyword, sources, target_language);

        let text = self
            .generator
            .generate(&self.prompts.synthesis.system, &user_prompt)
            .await?;

        if text.trim().is_empty() {
            return Err(crate::error::AvisaError::Synthesis {
                keyword: keyword.to_string(),
                reason: "empty generation result".to_string(),
            });
        }

        let (heading, prose) = split_heading(&text, keyword);
        let citations = attach_citations(&prose, sources);

        Ok(ArticleSegment {
            heading,
            keyword: keyword.to_string(),
            outcome: SegmentOutcome::Synthesized { prose, citations },
        })
    }

    /// Build the numbered-source prompt for one segment.
    ///
    /// Deterministic given the same candidates: source order is the group's
    /// rank order, and numbering starts at [1] per segment.
    fn build_segment_prompt(
        &self,
        keyword: &str,
        sources: &[&Candidate],
        target_language: &str,
    ) -> String {
        let source_material = sources
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                format!(
                    "[{}] Video: \"{}\" | Channel: {} | Timestamp: {}\nTranscript: {}",
                    i + 1,
                    candidate.chunk.title,
                    candidate.chunk.channel,
                    format_timestamp(candidate.chunk.start_offset),
                    candidate.chunk.text,
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut vars = HashMap::new();
        vars.insert("keyword".to_string(), keyword.to_string());
        vars.insert("language".to_string(), target_language.to_string());
        vars.insert("source_count".to_string(), sources.len().to_string());
        vars.insert("sources".to_string(), source_material);

        self.prompts
            .render_with_custom(&self.prompts.synthesis.user, &vars)
    }
}

/// Group candidates by originating keyword, preserving keyword order.
///
/// Within a group the candidates keep their global rank order, so the best
/// match for a keyword is always source [1] of its segment.
fn group_by_keyword(candidates: &[Candidate]) -> Vec<(String, Vec<&Candidate>)> {
    let mut order: Vec<usize> = Vec::new();
    let mut groups: HashMap<usize, (String, Vec<&Candidate>)> = HashMap::new();

    for candidate in candidates {
        groups
            .entry(candidate.keyword_index)
            .or_insert_with(|| {
                order.push(candidate.keyword_index);
                (candidate.keyword.clone(), Vec::new())
            })
            .1
            .push(candidate);
    }

    order.sort_unstable();
    order
        .into_iter()
        .filter_map(|i| groups.remove(&i))
        .collect()
}

/// Split a generated segment into heading and prose.
///
/// The prompt asks for a subheading on the first line; if the model skipped
/// it, the keyword stands in.
fn split_heading(text: &str, keyword: &str) -> (String, String) {
    let trimmed = text.trim();
    let mut lines = trimmed.splitn(2, '\n');
    let first = lines.next().unwrap_or_default().trim();
    let rest = lines.next().unwrap_or_default().trim();

    let looks_like_heading = first.len() <= 120
        && (first.starts_with('#') || (first.starts_with("**") && first.ends_with("**")));

    if looks_like_heading && !rest.is_empty() {
        let heading = first
            .trim_start_matches('#')
            .trim_matches('*')
            .trim()
            .to_string();
        (heading, rest.to_string())
    } else {
        (keyword.to_string(), trimmed.to_string())
    }
}

/// Extract `[n]` markers from prose and attach them as typed citations.
///
/// Each marker is resolved against the segment's numbered source list;
/// markers outside the list are dropped so provenance is never fabricated.
/// Citations appear once per marker, in first-occurrence order.
fn attach_citations(prose: &str, sources: &[&Candidate]) -> Vec<Citation> {
    let marker_re = Regex::new(r"\[(\d+)\]").expect("Invalid regex");
    let mut seen: Vec<usize> = Vec::new();
    let mut citations = Vec::new();

    for caps in marker_re.captures_iter(prose) {
        let marker: usize = match caps[1].parse() {
            Ok(m) => m,
            Err(_) => continue,
        };

        if marker == 0 || marker > sources.len() || seen.contains(&marker) {
            continue;
        }
        seen.push(marker);

        let chunk = &sources[marker - 1].chunk;
        citations.push(Citation {
            marker,
            video_id: chunk.video_id.clone(),
            title: chunk.title.clone(),
            channel: chunk.channel.clone(),
            timestamp_seconds: chunk.start_offset,
            excerpt: excerpt(&chunk.text, 160),
            url: chunk.url(),
        });
    }

    citations
}

/// Truncate text to a short excerpt on a char boundary.
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
