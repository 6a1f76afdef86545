// src/collect/mod.rs
// Collection stage: fan out over enabled sources, one fetch per source under
// the fetch limiter and retry policy. Faults are isolated per source; a dead
// source costs one FailureRecord, never the run.

pub mod browser;
pub mod feed;
pub mod static_html;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use crate::config::{FetchMethod, Settings, SourceConfig};
use crate::error::StageError;
use crate::limiter::run_bounded;
use crate::model::{Article, FailureRecord, Stage};
use crate::retry::{retry, RetryPolicy};

/// Fetch capability, dispatched per source `method`. One production
/// implementation (`SiteFetcher`); tests substitute their own.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<Article>, StageError>;
}

/// Production fetcher: tagged dispatch to feed / static / browser.
pub struct SiteFetcher {
    client: reqwest::Client,
}

impl SiteFetcher {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for SiteFetcher {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<Article>, StageError> {
        if source.url.trim().is_empty() {
            return Err(StageError::Config(format!(
                "source {} has an empty url",
                source.name
            )));
        }
        match source.method {
            FetchMethod::Feed => feed::fetch(&self.client, source).await,
            FetchMethod::Static => static_html::fetch(&self.client, source).await,
            FetchMethod::Browser => browser::fetch(source).await,
        }
    }
}

#[derive(Debug, Default)]
pub struct CollectOutput {
    pub articles: Vec<Article>,
    pub failures: Vec<FailureRecord>,
    pub per_source_counts: BTreeMap<String, usize>,
}

/// Run collection over the enabled sources. Output articles are ordered by
/// source declaration order, then fetcher-returned order.
pub async fn run(
    sources: &[SourceConfig],
    fetcher: Arc<dyn Fetch>,
    policy: RetryPolicy,
    max_concurrency: usize,
    stage_timeout: Duration,
    hours_lookback: u64,
) -> CollectOutput {
    let enabled: Vec<&SourceConfig> = sources.iter().filter(|s| s.enabled).collect();
    tracing::info!(
        target: "collect",
        sources = enabled.len(),
        max_concurrency,
        "collection stage starting"
    );

    let ops: Vec<(String, _)> = enabled
        .iter()
        .map(|s| {
            let source = (*s).clone();
            let fetcher = fetcher.clone();
            let fut = async move {
                let label = source.name.clone();
                let outcome = retry(&policy, &label, |attempt| {
                    let fetcher = fetcher.clone();
                    let source = source.clone();
                    async move {
                        tracing::debug!(target: "collect", source = %source.name, attempt, "fetching");
                        fetcher.fetch(&source).await
                    }
                })
                .await;
                Ok::<_, StageError>(outcome)
            };
            (s.name.clone(), fut)
        })
        .collect();

    let settled = run_bounded(max_concurrency, stage_timeout, ops).await;

    // Re-assemble in declaration order; completion order is meaningless.
    let mut by_source: BTreeMap<String, Vec<Article>> = BTreeMap::new();
    let mut failures = Vec::new();
    for (subject, res) in settled {
        match res {
            Ok(Ok(articles)) => {
                by_source.insert(subject, articles);
            }
            Ok(Err(retry_err)) => {
                failures.push(FailureRecord {
                    stage: Stage::Collection,
                    subject,
                    error_kind: retry_err.error.kind().to_string(),
                    attempt_count: retry_err.attempts,
                    message: retry_err.error.to_string(),
                });
            }
            Err(stage_err) => {
                failures.push(FailureRecord {
                    stage: Stage::Collection,
                    subject,
                    error_kind: stage_err.kind().to_string(),
                    attempt_count: 1,
                    message: stage_err.to_string(),
                });
            }
        }
    }

    let cutoff = (hours_lookback > 0)
        .then(|| Utc::now() - ChronoDuration::hours(hours_lookback as i64));

    let mut out = CollectOutput::default();
    let mut seen_keys: HashSet<String> = HashSet::new();
    for source in &enabled {
        let mut kept = 0usize;
        if let Some(articles) = by_source.remove(&source.name) {
            for article in articles.into_iter().take(source.max_articles) {
                // (source_name, url) must be unique within the run
                if !seen_keys.insert(article.key()) {
                    continue;
                }
                if let (Some(cutoff), Some(published)) = (cutoff, article.published_at) {
                    if published < cutoff {
                        tracing::debug!(
                            target: "collect",
                            source = %source.name,
                            url = %article.url,
                            "dropping stale article"
                        );
                        continue;
                    }
                }
                kept += 1;
                out.articles.push(article);
            }
        }
        out.per_source_counts.insert(source.name.clone(), kept);
        tracing::info!(target: "collect", source = %source.name, collected = kept, "source settled");
    }
    out.failures = failures;

    tracing::info!(
        target: "collect",
        articles = out.articles.len(),
        failures = out.failures.len(),
        "collection stage finished"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceType;

    fn source(name: &str, max_articles: usize) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            url: format!("https://{name}.test/"),
            source_type: SourceType::Html,
            method: FetchMethod::Static,
            selectors: BTreeMap::new(),
            max_articles,
            enabled: true,
        }
    }

    struct ScriptedFetcher;

    #[async_trait]
    impl Fetch for ScriptedFetcher {
        async fn fetch(&self, src: &SourceConfig) -> Result<Vec<Article>, StageError> {
            match src.name.as_str() {
                "dead" => Err(StageError::Network("unreachable".into())),
                "empty" => Ok(Vec::new()),
                name => Ok((0..5)
                    .map(|i| {
                        Article::raw(
                            name,
                            &format!("https://{name}.test/a{i}"),
                            &format!("{name} {i}"),
                            String::new(),
                        )
                    })
                    .collect()),
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(
            2,
            Duration::from_millis(1),
            Duration::from_millis(2),
        )
        .without_jitter()
    }

    #[tokio::test]
    async fn failed_source_isolated_and_counted_zero() {
        let sources = vec![source("alpha", 10), source("dead", 10), source("empty", 10)];
        let out = run(
            &sources,
            Arc::new(ScriptedFetcher),
            fast_policy(),
            2,
            Duration::from_secs(5),
            0,
        )
        .await;

        assert_eq!(out.articles.len(), 5);
        assert!(out.articles.iter().all(|a| a.source_name == "alpha"));

        assert_eq!(out.per_source_counts["alpha"], 5);
        assert_eq!(out.per_source_counts["dead"], 0);
        assert_eq!(out.per_source_counts["empty"], 0);

        // dead source: exactly one record, full retry budget consumed
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].subject, "dead");
        assert_eq!(out.failures[0].attempt_count, 2);
        assert_eq!(out.failures[0].stage, Stage::Collection);
    }

    #[tokio::test]
    async fn disabled_source_never_appears() {
        let mut disabled = source("alpha", 10);
        disabled.enabled = false;
        let sources = vec![disabled, source("beta", 10)];
        let out = run(
            &sources,
            Arc::new(ScriptedFetcher),
            fast_policy(),
            2,
            Duration::from_secs(5),
            0,
        )
        .await;
        assert!(!out.per_source_counts.contains_key("alpha"));
        assert_eq!(out.per_source_counts["beta"], 5);
    }

    #[tokio::test]
    async fn max_articles_truncates_preserving_order() {
        let sources = vec![source("alpha", 2)];
        let out = run(
            &sources,
            Arc::new(ScriptedFetcher),
            fast_policy(),
            1,
            Duration::from_secs(5),
            0,
        )
        .await;
        assert_eq!(out.articles.len(), 2);
        assert_eq!(out.articles[0].url, "https://alpha.test/a0");
        assert_eq!(out.articles[1].url, "https://alpha.test/a1");
        assert!(out.failures.is_empty());
    }

    #[tokio::test]
    async fn declaration_order_is_stable() {
        let sources = vec![source("zeta", 10), source("alpha", 10)];
        let out = run(
            &sources,
            Arc::new(ScriptedFetcher),
            fast_policy(),
            2,
            Duration::from_secs(5),
            0,
        )
        .await;
        assert_eq!(out.articles[0].source_name, "zeta");
        assert_eq!(out.articles[5].source_name, "alpha");
    }

    #[tokio::test]
    async fn stale_articles_filtered_by_lookback() {
        struct DatedFetcher;
        #[async_trait]
        impl Fetch for DatedFetcher {
            async fn fetch(&self, src: &SourceConfig) -> Result<Vec<Article>, StageError> {
                let mut fresh =
                    Article::raw(&src.name, "https://x.test/fresh", "fresh", String::new());
                fresh.published_at = Some(Utc::now());
                let mut stale =
                    Article::raw(&src.name, "https://x.test/stale", "stale", String::new());
                stale.published_at = Some(Utc::now() - ChronoDuration::hours(48));
                let undated =
                    Article::raw(&src.name, "https://x.test/undated", "undated", String::new());
                Ok(vec![fresh, stale, undated])
            }
        }

        let sources = vec![source("dated", 10)];
        let out = run(
            &sources,
            Arc::new(DatedFetcher),
            fast_policy(),
            1,
            Duration::from_secs(5),
            24,
        )
        .await;
        let urls: Vec<&str> = out.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.test/fresh", "https://x.test/undated"]);
        assert_eq!(out.per_source_counts["dated"], 2);
    }
}
