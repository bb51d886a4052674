//! Configuration module for Avisa.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, SynthesisPrompts};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, IndexSettings, PromptSettings,
    RetrievalSettings, Settings, SourceSettings, SynthesisSettings,
};
