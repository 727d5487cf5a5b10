//! Analyze one onboarding answer from the command line.
//!
//! Usage:
//!   cargo run --bin analyze -- request.json
//!   echo '{"user_id":"u1","question":"...","answer":"..."}' | cargo run --bin analyze

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ember_insight::schemas::AnalysisRequestBody;
use ember_insight::{AnalysisRequest, Config, Orchestrator, init_tracing};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "analyze")]
#[command(about = "Run insight and trait analysis on one onboarding answer", long_about = None)]
struct Cli {
    /// Request JSON file; reads stdin when omitted
    file: Option<PathBuf>,

    /// Print single-line JSON instead of pretty output
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("Configuration error")?;
    init_tracing(config.app.debug);

    let raw = read_input(cli.file.as_deref())?;
    let payload: Value = serde_json::from_str(&raw).context(if cli.file.is_some() {
        "Invalid JSON in file"
    } else {
        "Invalid JSON input"
    })?;

    let body: AnalysisRequestBody =
        serde_json::from_value(payload).context("Invalid input")?;
    let request = AnalysisRequest::try_from(body).context("Invalid input")?;

    let orchestrator = Orchestrator::from_config(&config).context("Configuration error")?;

    match orchestrator.analyze(request).await {
        Ok(output) => print_json(&serde_json::to_value(&output)?, cli.compact),
        Err(err) => {
            // The structured failure goes to stdout like a success would;
            // stderr carries the one-line summary.
            print_json(&err.to_json(config.app.debug), cli.compact)?;
            Err(anyhow::Error::new(err).context("Analysis failed"))
        }
    }
}

fn print_json(value: &Value, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to render output")?;
    println!("{}", rendered);
    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                anyhow::bail!("File not found: {}", path.display())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        },
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}
