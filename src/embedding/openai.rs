//! OpenAI embeddings implementation.

use super::Embedder;
use crate::error::{AvisaError, Result};
use crate::openai::{classify_openai_error, create_client, retry_backoff};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
    max_retries: usize,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder with default settings.
    pub fn new() -> Self {
        Self::with_config("text-embedding-3-small", 1536, 3)
    }

    /// Create a new OpenAI embedder with custom model, dimensions, and retry cap.
    pub fn with_config(model: &str, dimensions: usize, max_retries: usize) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            dimensions,
            max_retries: max_retries.max(1),
        }
    }

    /// One embedding API call with bounded retry on transient failures.
    async fn embed_call(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(input))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| AvisaError::Embedding(format!("Failed to build request: {}", e)))?;

        let mut attempt = 0;
        loop {
            match self.client.embeddings().create(request.clone()).await {
                Ok(response) => {
                    // Sort by index to ensure correct order
                    let mut embeddings: Vec<_> = response.data.into_iter().collect();
                    embeddings.sort_by_key(|e| e.index);
                    return Ok(embeddings.into_iter().map(|e| e.embedding).collect());
                }
                Err(e) => {
                    let err = classify_openai_error(e);
                    if err.is_transient() && attempt + 1 < self.max_retries {
                        attempt += 1;
                        let delay = retry_backoff(attempt);
                        warn!(
                            "Embedding call failed ({}), retrying in {:?} (attempt {}/{})",
                            err, delay, attempt, self.max_retries
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for OpenAIEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AvisaError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        // API-side input limits; the index batches above this layer too.
        const MAX_INPUTS_PER_CALL: usize = 100;
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_INPUTS_PER_CALL) {
            let embeddings = self.embed_call(chunk.to_vec()).await?;
            all_embeddings.extend(embeddings);
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn fingerprint(&self) -> String {
        format!("openai/{}/{}", self.model, self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::new();
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(
            embedder.fingerprint(),
            "openai/text-embedding-3-small/1536"
        );

        let embedder = OpenAIEmbedder::with_config("text-embedding-3-large", 3072, 3);
        assert_eq!(embedder.dimensions(), 3072);
    }
}
