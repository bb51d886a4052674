//! Generate command implementation.

use super::fetch::cancel_on_ctrl_c;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use crate::render;
use anyhow::Result;

/// Run the generate command.
pub async fn run_generate(
    keywords: &[String],
    language: Option<String>,
    output: Option<String>,
    format: &str,
    split: Option<usize>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Generate) {
        Output::error(&format!("{}", e));
        Output::info("Run 'avisa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    let pipeline = Pipeline::new(settings)?;
    let cancel = cancel_on_ctrl_c();

    let spinner = Output::spinner("Retrieving and synthesizing...");
    let article = pipeline.generate(&keywords, language.as_deref(), &cancel).await;
    spinner.finish_and_clear();

    let article = match article {
        Ok(article) => article,
        Err(e) => {
            Output::error(&format!("Generation failed: {}", e));
            return Err(e.into());
        }
    };

    for keyword in article.failed_keywords() {
        Output::warning(&format!("Segment '{}' failed and was left out of the prose.", keyword));
    }

    if !article.is_usable() {
        Output::error("Every segment failed; no usable article was produced.");
        return Err(anyhow::anyhow!("all segments failed"));
    }

    let rendered = match format {
        "html" => render::render_html(&article),
        "text" => {
            let text = render::render_text(&article);
            match split {
                Some(max_len) => render::split_message(&text, max_len).join("\n\n=== PART ===\n\n"),
                None => text,
            }
        }
        other => {
            Output::error(&format!("Unknown format: {} (expected html or text)", other));
            return Err(anyhow::anyhow!("unknown format"));
        }
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            Output::success(&format!(
                "Wrote {} newsletter to {} ({} segments, {} videos cited)",
                format,
                path,
                article.segments.len(),
                article.cited_video_count()
            ));
        }
        None => {
            println!("{}", rendered);
        }
    }

    Ok(())
}
