//! Pipeline coordination for Avisa.
//!
//! Wires the components together for the three entry points: fetching
//! transcripts into the chunk corpus, rebuilding the index from the corpus,
//! and generating a newsletter from keywords.

use crate::chunking::{chunk_transcript, ChunkingConfig};
use crate::config::{Prompts, Settings};
use crate::corpus;
use crate::embedding::{Embedder, MockEmbedder, OpenAIEmbedder};
use crate::error::{AvisaError, Result};
use crate::index::{CancelFlag, EmbeddingIndex, MemoryIndex, RebuildReport, SqliteIndex};
use crate::retrieval::Retriever;
use crate::synthesis::{Article, ArticleGenerator, OpenAIGenerator, Synthesizer};
use crate::transcript::{TranscriptSource, YoutubeTranscriptSource};
use fs2::FileExt;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The main pipeline, owning one instance of every component.
pub struct Pipeline {
    settings: Settings,
    prompts: Prompts,
    source: Arc<dyn TranscriptSource>,
    index: Arc<dyn EmbeddingIndex>,
    generator: Arc<dyn ArticleGenerator>,
}

impl Pipeline {
    /// Create a pipeline from settings, wiring the default components.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = match settings.embedding.provider.as_str() {
            "openai" => Arc::new(OpenAIEmbedder::with_config(
                &settings.embedding.model,
                settings.embedding.dimensions as usize,
                settings.embedding.max_retries,
            )),
            "mock" => Arc::new(MockEmbedder::with_dimensions(
                settings.embedding.dimensions as usize,
            )),
            other => {
                return Err(AvisaError::Config(format!(
                    "Unknown embedding provider: {}",
                    other
                )))
            }
        };

        let index: Arc<dyn EmbeddingIndex> = match settings.index.provider.as_str() {
            "sqlite" => Arc::new(SqliteIndex::new(
                &settings.sqlite_path(),
                embedder.clone(),
                settings.embedding.batch_size,
            )?),
            "memory" => Arc::new(MemoryIndex::new(
                embedder.clone(),
                settings.embedding.batch_size,
            )),
            other => {
                return Err(AvisaError::Config(format!(
                    "Unknown index provider: {}",
                    other
                )))
            }
        };

        let generator: Arc<dyn ArticleGenerator> =
            Arc::new(OpenAIGenerator::new(&settings.synthesis.model));

        Ok(Self {
            settings,
            prompts,
            source: Arc::new(YoutubeTranscriptSource::new()),
            index,
            generator,
        })
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        source: Arc<dyn TranscriptSource>,
        index: Arc<dyn EmbeddingIndex>,
        generator: Arc<dyn ArticleGenerator>,
    ) -> Self {
        Self {
            settings,
            prompts,
            source,
            index,
            generator,
        }
    }

    /// Get a reference to the index.
    pub fn index(&self) -> Arc<dyn EmbeddingIndex> {
        self.index.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Fetch transcripts for all configured channels into the chunk corpus.
    ///
    /// Transcript failures for individual videos are skipped and reported;
    /// the corpus is persisted after every video so a partial run keeps its
    /// progress. The corpus is truncated at the start: each fetch is a full
    /// pass, matching the full-rebuild semantics of the index.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_corpus(&self, cancel: &CancelFlag) -> Result<FetchReport> {
        if self.settings.source.channels.is_empty() {
            return Err(AvisaError::Config(
                "No channels configured. Add [source] channels to your config.".to_string(),
            ));
        }

        let corpus_path = self.settings.corpus_path();
        corpus::write_corpus(&corpus_path, &[])?;

        let chunk_config = ChunkingConfig {
            window_seconds: self.settings.chunking.window_seconds,
            overlap_seconds: self.settings.chunking.overlap_seconds,
        };

        let mut report = FetchReport::default();

        for channel in &self.settings.source.channels {
            cancel.check()?;
            info!("Scanning channel: {}", channel);

            let videos = match self
                .source
                .list_recent(
                    channel,
                    self.settings.source.lookback_days,
                    self.settings.source.max_videos_per_channel,
                )
                .await
            {
                Ok(videos) => videos,
                Err(e) => {
                    warn!("Channel {} failed, continuing: {}", channel, e);
                    report.failed_channels.push((channel.clone(), e.to_string()));
                    continue;
                }
            };

            for video in videos {
                cancel.check()?;
                report.videos_found += 1;

                let transcript = match self.source.fetch_transcript(&video).await {
                    Ok(t) => t,
                    Err(e @ AvisaError::TranscriptUnavailable { .. }) => {
                        info!("Skipping {}: {}", video.video_id, e);
                        report
                            .videos_skipped
                            .push((video.video_id.clone(), e.to_string()));
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let chunks = chunk_transcript(&transcript, &chunk_config)?;
                corpus::append_corpus(&corpus_path, &chunks)?;

                report.videos_chunked += 1;
                report.chunks_written += chunks.len();
            }
        }

        info!(
            "Fetch complete: {} videos chunked, {} skipped, {} chunks",
            report.videos_chunked,
            report.videos_skipped.len(),
            report.chunks_written
        );

        Ok(report)
    }

    /// Rebuild the index from the persisted chunk corpus.
    pub async fn rebuild_index(&self) -> Result<RebuildReport> {
        self.rebuild_index_with_cancel(&CancelFlag::new()).await
    }

    /// Rebuild with an external cancellation flag.
    ///
    /// Holds an exclusive lock file for the duration of the build: rebuilds
    /// are single-writer per index, and a second caller fails fast with
    /// `RebuildLocked` instead of corrupting the swap.
    #[instrument(skip(self, cancel))]
    pub async fn rebuild_index_with_cancel(&self, cancel: &CancelFlag) -> Result<RebuildReport> {
        let chunks = corpus::read_corpus(&self.settings.corpus_path())?;

        let _lock = RebuildLock::acquire(self.lock_path())?;

        self.index
            .rebuild(&self.settings.index.collection, &chunks, cancel)
            .await
    }

    /// Generate a newsletter article for the given keywords.
    ///
    /// Keywords are explicit input; the target language defaults from
    /// settings. The returned article may contain failed segments; callers
    /// decide whether a partial article is worth rendering (`is_usable`).
    #[instrument(skip(self, cancel), fields(keywords = keywords.len()))]
    pub async fn generate(
        &self,
        keywords: &[String],
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<Article> {
        if keywords.is_empty() {
            return Err(AvisaError::InvalidInput(
                "At least one keyword is required".to_string(),
            ));
        }

        let retriever = Retriever::new(self.index.clone(), &self.settings.index.collection)
            .with_top_k(self.settings.retrieval.top_k_per_keyword)
            .with_max_concurrent(self.settings.retrieval.max_concurrent_queries)
            .with_min_score(self.settings.retrieval.min_score);

        let candidates = retriever.retrieve(keywords).await?;
        info!("Retrieved {} candidate chunks", candidates.len());

        if candidates.is_empty() {
            return Err(AvisaError::InvalidInput(
                "No matching content found for the given keywords".to_string(),
            ));
        }

        let synthesizer = Synthesizer::new(self.generator.clone())
            .with_prompts(self.prompts.clone())
            .with_max_sources(self.settings.synthesis.max_sources_per_segment);

        let language = language.unwrap_or(&self.settings.synthesis.language);
        synthesizer.synthesize(&candidates, language, cancel).await
    }

    fn lock_path(&self) -> PathBuf {
        self.settings.data_dir().join("rebuild.lock")
    }
}

/// Result of a corpus fetch pass.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Videos discovered across all channels.
    pub videos_found: usize,
    /// Videos successfully transcribed and chunked.
    pub videos_chunked: usize,
    /// Chunks written to the corpus.
    pub chunks_written: usize,
    /// Videos skipped with the reason (no captions, private, ...).
    pub videos_skipped: Vec<(String, String)>,
    /// Channels that failed entirely.
    pub failed_channels: Vec<(String, String)>,
}

/// Exclusive advisory lock held for the duration of a rebuild.
struct RebuildLock {
    file: File,
}

impl RebuildLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| AvisaError::RebuildLocked(path.display().to_string()))?;
        Ok(Self { file })
    }
}

impl Drop for RebuildLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rebuild.lock");

        let first = RebuildLock::acquire(path.clone()).unwrap();
        let second = RebuildLock::acquire(path.clone());
        assert!(matches!(second, Err(AvisaError::RebuildLocked(_))));

        drop(first);
        assert!(RebuildLock::acquire(path).is_ok());
    }
}
