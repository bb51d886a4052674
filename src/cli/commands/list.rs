//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let pipeline = Pipeline::new(settings)?;

    match pipeline.index().list_collections().await {
        Ok(collections) => {
            if collections.is_empty() {
                Output::info("No collections yet. Use 'avisa fetch' then 'avisa index' to build one.");
            } else {
                Output::header(&format!("Collections ({})", collections.len()));
                println!();

                for collection in &collections {
                    Output::collection_info(
                        &collection.name,
                        collection.chunk_count,
                        &collection.embedder_fingerprint,
                        &collection.built_at.format("%Y-%m-%d %H:%M").to_string(),
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to list collections: {}", e));
            Err(e.into())
        }
    }
}
