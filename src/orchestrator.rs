// src/orchestrator.rs
// Sequences collection -> enrichment -> publication and assembles the
// RunResult. Holds no fetch/enrichment/publication logic of its own; it only
// propagates limits and retry parameters into each stage and decides the
// final status.

use std::sync::Arc;

use chrono::Utc;

use crate::collect::{self, Fetch};
use crate::config::{Settings, SourceConfig};
use crate::enrich::{self, Summarize};
use crate::model::{RunResult, RunStatus};
use crate::publish::{self, Sink};
use crate::report::DailyReport;

pub struct Orchestrator {
    settings: Settings,
    sources: Vec<SourceConfig>,
    fetcher: Arc<dyn Fetch>,
    summarizer: Arc<dyn Summarize>,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        sources: Vec<SourceConfig>,
        fetcher: Arc<dyn Fetch>,
        summarizer: Arc<dyn Summarize>,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> Self {
        Self {
            settings,
            sources,
            fetcher,
            summarizer,
            sinks,
        }
    }

    /// Run the full pipeline once. Per-item failures degrade the run to
    /// `partial`; only a meaningless run (no enabled sources, or zero
    /// articles out of collection) is `failed`.
    pub async fn run(&self) -> RunResult {
        let started_at = Utc::now();
        let policy = self.settings.retry_policy();

        let enabled = self.sources.iter().filter(|s| s.enabled).count();
        tracing::info!(target: "run", enabled, total = self.sources.len(), "pipeline starting");

        if enabled == 0 {
            tracing::error!(target: "run", "no sources enabled, aborting");
            return RunResult {
                started_at,
                finished_at: Utc::now(),
                articles: Vec::new(),
                failures: Vec::new(),
                per_source_counts: Default::default(),
                publish_results: Default::default(),
                status: RunStatus::Failed,
            };
        }

        // Stage 1/3: collection
        tracing::info!(target: "run", "stage 1/3: collecting articles");
        let collected = collect::run(
            &self.sources,
            self.fetcher.clone(),
            policy,
            self.settings.fetch_concurrency,
            self.settings.collect_timeout,
            self.settings.hours_lookback,
        )
        .await;

        let mut failures = collected.failures;
        let per_source_counts = collected.per_source_counts;

        if collected.articles.is_empty() {
            tracing::error!(target: "run", "zero articles collected, aborting before publication");
            return RunResult {
                started_at,
                finished_at: Utc::now(),
                articles: Vec::new(),
                failures,
                per_source_counts,
                publish_results: Default::default(),
                status: RunStatus::Failed,
            };
        }

        // Stage 2/3: enrichment
        tracing::info!(target: "run", articles = collected.articles.len(), "stage 2/3: enriching");
        let (articles, enrich_failures) = enrich::run(
            collected.articles,
            self.summarizer.clone(),
            policy,
            self.settings.enrich_concurrency,
            self.settings.enrich_timeout,
        )
        .await;
        failures.extend(enrich_failures);

        // Stage 3/3: publication
        tracing::info!(target: "run", sinks = self.sinks.len(), "stage 3/3: publishing");
        let report = DailyReport::build(&articles, self.settings.report_top_n);
        let published = publish::run(&report, &self.sinks, self.settings.publish_timeout).await;
        failures.extend(published.failures);

        let status = if failures.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        };

        let result = RunResult {
            started_at,
            finished_at: Utc::now(),
            articles,
            failures,
            per_source_counts,
            publish_results: published.results,
            status,
        };

        tracing::info!(
            target: "run",
            status = ?result.status,
            articles = result.articles.len(),
            failures = result.failures.len(),
            elapsed_secs = format!("{:.2}", result.elapsed_secs()),
            "pipeline finished"
        );
        result
    }
}
