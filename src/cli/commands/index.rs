//! Index command implementation.

use super::fetch::cancel_on_ctrl_c;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the index command: rebuild the collection from the chunk corpus.
pub async fn run_index(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index) {
        Output::error(&format!("{}", e));
        Output::info("Run 'avisa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::new(settings)?;
    let cancel = cancel_on_ctrl_c();

    let spinner = Output::spinner("Embedding and indexing chunks...");
    let report = pipeline.rebuild_index_with_cancel(&cancel).await;
    spinner.finish_and_clear();

    match report {
        Ok(report) => {
            Output::success(&format!(
                "Rebuilt collection '{}': {} chunks in {} batches",
                report.collection, report.chunks_indexed, report.batches
            ));
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Index rebuild failed: {}", e));
            Err(e.into())
        }
    }
}
