//! Avisa - Video Transcript Newsletters
//!
//! A local-first CLI tool for turning timestamped video transcripts into
//! synthesized newsletters with per-claim citations.
//!
//! The name "Avisa" comes from the Norwegian word for "the newspaper."
//!
//! # Overview
//!
//! Avisa allows you to:
//! - Fetch timestamped transcripts for recent videos from configured channels
//! - Chunk transcripts into fixed-duration, searchable units
//! - Build a semantic vector index over the chunk corpus
//! - Generate a multi-source newsletter where every claim deep-links back to
//!   the exact video timestamp that supports it
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `transcript` - Transcript data model and source abstraction
//! - `chunking` - Fixed-window transcript chunking
//! - `corpus` - Persisted JSONL chunk corpus
//! - `embedding` - Embedding generation
//! - `index` - Vector index abstraction with named collections
//! - `retrieval` - Multi-keyword retrieval and candidate merging
//! - `synthesis` - Article synthesis with citation provenance
//! - `render` - HTML and plain-text newsletter rendering
//! - `pipeline` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use avisa::config::Settings;
//! use avisa::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     // Build the index from the persisted chunk corpus
//!     let report = pipeline.rebuild_index().await?;
//!     println!("Indexed {} chunks", report.chunks_indexed);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod openai;
pub mod pipeline;
pub mod render;
pub mod retrieval;
pub mod synthesis;
pub mod transcript;

pub use error::{AvisaError, Result};
