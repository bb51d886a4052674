//! CLI module for Avisa.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Avisa - Video Transcript Newsletters
///
/// A local-first CLI tool for turning timestamped video transcripts into
/// synthesized newsletters with per-claim citations.
/// The name "Avisa" comes from the Norwegian word for "the newspaper."
#[derive(Parser, Debug)]
#[command(name = "avisa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Avisa and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Fetch transcripts for configured channels into the chunk corpus
    Fetch,

    /// Rebuild the vector index from the chunk corpus
    Index,

    /// Search the index for a single query (debugging retrieval)
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Generate a newsletter for the given topic keywords
    Generate {
        /// Topic keywords (comma-separated or repeated)
        #[arg(required = true, value_delimiter = ',')]
        keywords: Vec<String>,

        /// Target language for the article
        #[arg(short, long)]
        language: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (html, text)
        #[arg(long, default_value = "html")]
        format: String,

        /// Split text output into message-sized parts of this many characters
        #[arg(long)]
        split: Option<usize>,
    },

    /// List index collections
    List,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
