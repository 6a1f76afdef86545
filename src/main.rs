//! trend-digest binary entrypoint.
//! One invocation is one pipeline run: collect, enrich, publish, exit.
//! Exit code 0 covers `success` and `partial`; a `failed` run exits 1.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_digest::collect::SiteFetcher;
use trend_digest::config::{self, Settings};
use trend_digest::enrich;
use trend_digest::publish::{file::FileSink, notion::NotionSink, Sink};
use trend_digest::{Orchestrator, RunStatus};

#[derive(Debug, Parser)]
#[command(name = "trend-digest", about = "Daily IT trend collection and reporting")]
struct Cli {
    /// Skip the local file sink
    #[arg(long)]
    no_file: bool,

    /// Skip the Notion workspace sink
    #[arg(long)]
    no_notion: bool,

    /// Log verbosity (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Path to the sources file (defaults to $SOURCES_PATH or config/sources.toml)
    #[arg(long)]
    sources: Option<PathBuf>,
}

fn init_tracing(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_sinks(cli: &Cli, settings: &Settings) -> anyhow::Result<Vec<Arc<dyn Sink>>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
    if !cli.no_file {
        sinks.push(Arc::new(FileSink::new(settings.output_dir.clone())));
    }
    if !cli.no_notion {
        match (&settings.notion_api_key, &settings.notion_parent_page_id) {
            (Some(key), Some(parent)) => {
                sinks.push(Arc::new(NotionSink::new(key, parent, &settings.user_agent)?));
            }
            _ => tracing::warn!(
                "NOTION_API_KEY / NOTION_PARENT_PAGE_ID not set, skipping workspace sink"
            ),
        }
    }
    Ok(sinks)
}

async fn run(cli: Cli) -> anyhow::Result<RunStatus> {
    let settings = Settings::from_env();

    let sources = match &cli.sources {
        Some(path) => config::load_sources_from(path)?,
        None => config::load_sources_default()?,
    };

    let fetcher = Arc::new(SiteFetcher::new(&settings).context("building fetcher")?);
    let summarizer = enrich::build_summarizer(&settings).context("building summarizer")?;
    let sinks = build_sinks(&cli, &settings)?;

    let orchestrator = Orchestrator::new(settings, sources, fetcher, summarizer, sinks);
    let result = orchestrator.run().await;

    for failure in &result.failures {
        tracing::warn!(
            stage = %failure.stage,
            subject = %failure.subject,
            kind = %failure.error_kind,
            attempts = failure.attempt_count,
            "{}",
            failure.message
        );
    }
    Ok(result.status)
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let code = match run(cli).await {
        Ok(RunStatus::Failed) => 1,
        Ok(_) => 0,
        Err(e) => {
            tracing::error!(error = ?e, "run aborted");
            1
        }
    };
    std::process::exit(code);
}
