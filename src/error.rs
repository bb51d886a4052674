//! Error types for Avisa.

use thiserror::Error;

/// Library-level error type for Avisa operations.
#[derive(Error, Debug)]
pub enum AvisaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Collection '{0}' not found. Run 'avisa index' first to build it.")]
    CollectionNotFound(String),

    #[error("Transient service error: {0}")]
    Transient(String),

    #[error("Embedding space mismatch: collection was built with {built_with}, query uses {query_with}. Rebuild the collection with the current embedder.")]
    EmbeddingSpaceMismatch {
        built_with: String,
        query_with: String,
    },

    #[error("Synthesis failed for segment '{keyword}': {reason}")]
    Synthesis { keyword: String, reason: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Transcript unavailable for {video_id}: {reason}")]
    TranscriptUnavailable { video_id: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Rebuild already in progress for this index (lock held): {0}")]
    RebuildLocked(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AvisaError {
    /// Whether this error is worth retrying at the call site.
    ///
    /// Quota exhaustion and auth failures come back as `OpenAI`, never
    /// `Transient`, so they are reported instead of retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AvisaError::Transient(_))
    }
}

/// Result type alias for Avisa operations.
pub type Result<T> = std::result::Result<T, AvisaError>;
