//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Avisa Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    // Check external tools
    println!("{}", style("External Tools").bold());
    let tool_check = check_ytdlp();
    tool_check.print();
    checks.push(tool_check);

    println!();

    // Check API keys
    println!("{}", style("API Configuration").bold());
    let api_check = check_openai_api_key();
    api_check.print();
    checks.push(api_check);

    println!();

    // Check configuration
    println!("{}", style("Configuration").bold());
    let config_checks = check_configuration(settings);
    for check in &config_checks {
        check.print();
    }
    checks.extend(config_checks);

    println!();

    // Check pipeline data
    println!("{}", style("Pipeline Data").bold());
    let data_checks = check_data(settings);
    for check in &data_checks {
        check.print();
    }
    checks.extend(data_checks);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Warning)
        .count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Avisa.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("{} warning(s). Avisa will work with reduced functionality.", warnings));
    } else {
        Output::success("All checks passed!");
    }

    Ok(())
}

fn check_ytdlp() -> CheckResult {
    match Command::new("yt-dlp").arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            CheckResult::ok("yt-dlp", &format!("found (version {})", version))
        }
        Ok(_) => CheckResult::error(
            "yt-dlp",
            "installed but not working correctly",
            "Reinstall with: pip install -U yt-dlp",
        ),
        Err(_) => CheckResult::error(
            "yt-dlp",
            "not found",
            "Install with: pip install yt-dlp (required for 'avisa fetch')",
        ),
    }
}

fn check_openai_api_key() -> CheckResult {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => CheckResult::ok("OPENAI_API_KEY", "configured"),
        _ => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set it with: export OPENAI_API_KEY='sk-...' (required for index and generate)",
        ),
    }
}

fn check_configuration(settings: &Settings) -> Vec<CheckResult> {
    let mut checks = Vec::new();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        checks.push(CheckResult::ok(
            "config file",
            &format!("{}", config_path.display()),
        ));
    } else {
        checks.push(CheckResult::warning(
            "config file",
            "not found, using defaults",
            "Create one with: avisa init",
        ));
    }

    if settings.source.channels.is_empty() {
        checks.push(CheckResult::warning(
            "channels",
            "no channels configured",
            "Add channels under [source] in the config, e.g. channels = [\"@somechannel\"]",
        ));
    } else {
        checks.push(CheckResult::ok(
            "channels",
            &format!("{} configured", settings.source.channels.len()),
        ));
    }

    checks
}

fn check_data(settings: &Settings) -> Vec<CheckResult> {
    let mut checks = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        checks.push(CheckResult::ok(
            "data directory",
            &format!("{}", data_dir.display()),
        ));
    } else {
        checks.push(CheckResult::warning(
            "data directory",
            "does not exist yet",
            "It is created on first run.",
        ));
    }

    let corpus_path = settings.corpus_path();
    if corpus_path.exists() {
        let lines = std::fs::read_to_string(&corpus_path)
            .map(|s| s.lines().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0);
        checks.push(CheckResult::ok(
            "chunk corpus",
            &format!("{} chunks at {}", lines, corpus_path.display()),
        ));
    } else {
        checks.push(CheckResult::warning(
            "chunk corpus",
            "not built yet",
            "Run 'avisa fetch' to build it.",
        ));
    }

    let index_path = settings.sqlite_path();
    if index_path.exists() {
        checks.push(CheckResult::ok(
            "vector index",
            &format!("{}", index_path.display()),
        ));
    } else {
        checks.push(CheckResult::warning(
            "vector index",
            "not built yet",
            "Run 'avisa index' after fetching.",
        ));
    }

    checks
}
