//! Article text generation.
//!
//! The synthesizer owns prompt construction and citation handling; the actual
//! language generation sits behind this trait so it can be mocked in tests.

use crate::error::{AvisaError, Result};
use crate::openai::{classify_openai_error, create_client, retry_backoff};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

/// Trait for prose generation from a prepared prompt.
#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    /// Generate prose for one segment from system and user prompts.
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI chat-completion generator.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_retries: usize,
}

impl OpenAIGenerator {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            max_retries: 3,
        }
    }

    async fn generate_once(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| AvisaError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| AvisaError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .build()
            .map_err(|e| AvisaError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_openai_error)?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| AvisaError::OpenAI("Empty response from LLM".to_string()))?
            .clone();

        debug!("Generated {} characters", text.len());
        Ok(text)
    }
}

#[async_trait]
impl ArticleGenerator for OpenAIGenerator {
    #[instrument(skip_all)]
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.generate_once(system, user).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt + 1 < self.max_retries => {
                    attempt += 1;
                    let delay = retry_backoff(attempt);
                    warn!(
                        "Generation failed ({}), retrying in {:?} (attempt {}/{})",
                        e, delay, attempt, self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
