//! OpenAI client configuration and shared error handling.

use crate::error::AvisaError;
use async_openai::error::OpenAIError;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with configured timeout.
///
/// Uses a 5-minute timeout by default to prevent hung API calls.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Map an OpenAI SDK error onto the Avisa taxonomy.
///
/// Rate limiting and server hiccups are `Transient` (retryable with backoff).
/// Quota exhaustion and auth failures are terminal `OpenAI` errors: retrying
/// them would loop forever against a hard wall.
pub fn classify_openai_error(err: OpenAIError) -> AvisaError {
    match err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or_default();
            let kind = api.r#type.as_deref().unwrap_or_default();
            let message = api.message.to_lowercase();

            if code == "insufficient_quota"
                || kind == "insufficient_quota"
                || message.contains("insufficient quota")
            {
                AvisaError::OpenAI(format!("quota exhausted: {}", api.message))
            } else if code == "invalid_api_key" || kind == "authentication_error" {
                AvisaError::OpenAI(format!("authentication failed: {}", api.message))
            } else if code == "rate_limit_exceeded"
                || kind == "server_error"
                || message.contains("rate limit")
            {
                AvisaError::Transient(api.message)
            } else {
                AvisaError::OpenAI(api.message)
            }
        }
        OpenAIError::Reqwest(e) => {
            if e.is_timeout() || e.is_connect() || e.is_request() {
                AvisaError::Transient(e.to_string())
            } else {
                AvisaError::OpenAI(e.to_string())
            }
        }
        other => AvisaError::OpenAI(other.to_string()),
    }
}

/// Exponential backoff delay for the given retry attempt (1-based).
pub fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}
