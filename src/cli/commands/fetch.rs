//! Fetch command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::index::CancelFlag;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the fetch command.
pub async fn run_fetch(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Fetch) {
        Output::error(&format!("{}", e));
        Output::info("Run 'avisa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::new(settings)?;
    let cancel = cancel_on_ctrl_c();

    let spinner = Output::spinner("Fetching transcripts...");
    let report = pipeline.fetch_corpus(&cancel).await;
    spinner.finish_and_clear();

    match report {
        Ok(report) => {
            Output::success(&format!(
                "Fetched {} of {} videos ({} chunks written)",
                report.videos_chunked, report.videos_found, report.chunks_written
            ));

            if !report.videos_skipped.is_empty() {
                Output::warning(&format!(
                    "{} videos skipped (no transcript available):",
                    report.videos_skipped.len()
                ));
                for (video_id, reason) in &report.videos_skipped {
                    Output::list_item(&format!("{}: {}", video_id, reason));
                }
            }

            for (channel, reason) in &report.failed_channels {
                Output::warning(&format!("Channel '{}' failed: {}", channel, reason));
            }

            Output::info("Next: run 'avisa index' to rebuild the vector index.");
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Fetch failed: {}", e));
            Err(e.into())
        }
    }
}

/// Cancel flag wired to Ctrl-C: the pipeline stops at its next checkpoint.
pub(crate) fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            Output::warning("Interrupt received, stopping at the next checkpoint...");
            flag.cancel();
        }
    });
    cancel
}
