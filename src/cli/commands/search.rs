//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use crate::transcript::format_timestamp;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, limit: usize, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search) {
        Output::error(&format!("{}", e));
        Output::info("Run 'avisa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let collection = settings.index.collection.clone();
    let pipeline = Pipeline::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = pipeline.index().query(&collection, query, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) => {
            if results.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", results.len()));

                for result in &results {
                    Output::search_result(
                        &result.chunk.title,
                        &format_timestamp(result.chunk.start_offset),
                        result.score,
                        &result.chunk.text,
                        &result.chunk.url(),
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            Err(e.into())
        }
    }
}
