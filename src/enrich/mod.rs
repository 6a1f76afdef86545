// src/enrich/mod.rs
// Enrichment stage: per-article summarization/classification under its own
// limiter and retry policy. A failed article is degraded (status=failed,
// importance=B), never dropped.

pub mod claude;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Settings;
use crate::error::StageError;
use crate::limiter::run_bounded;
use crate::model::{Article, EnrichmentStatus, FailureRecord, Importance, Stage};
use crate::retry::{retry, RetryPolicy};

/// Structured result from the summarization capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub summary: String,
    pub tags: Vec<String>,
    pub importance: Importance,
}

/// Summarization capability. One production implementation
/// (`claude::ClaudeSummarizer`); tests substitute their own.
#[async_trait]
pub trait Summarize: Send + Sync {
    /// A disabled summarizer short-circuits the stage: every article is
    /// marked `skipped` and no calls are made.
    fn enabled(&self) -> bool {
        true
    }

    async fn summarize(&self, title: &str, raw_content: &str) -> Result<Summary, StageError>;
}

/// No-key / explicitly disabled variant.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarize for DisabledSummarizer {
    fn enabled(&self) -> bool {
        false
    }

    async fn summarize(&self, _title: &str, _raw_content: &str) -> Result<Summary, StageError> {
        Err(StageError::Api("summarizer is disabled".into()))
    }
}

/// Deterministic summarizer for local runs (`ENRICH_TEST_MODE=mock`).
#[derive(Default)]
pub struct MockSummarizer;

#[async_trait]
impl Summarize for MockSummarizer {
    async fn summarize(&self, title: &str, _raw_content: &str) -> Result<Summary, StageError> {
        Ok(Summary {
            summary: format!("Mock summary for: {title}"),
            tags: vec!["mock".to_string()],
            importance: Importance::A,
        })
    }
}

/// Select the summarizer implementation from settings and environment.
pub fn build_summarizer(settings: &Settings) -> anyhow::Result<Arc<dyn Summarize>> {
    if std::env::var("ENRICH_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        tracing::info!(target: "enrich", "using mock summarizer");
        return Ok(Arc::new(MockSummarizer));
    }
    if !settings.enrich_enabled {
        tracing::warn!(target: "enrich", "enrichment disabled, articles will be skipped");
        return Ok(Arc::new(DisabledSummarizer));
    }
    match settings.anthropic_api_key.as_deref() {
        Some(key) => Ok(Arc::new(claude::ClaudeSummarizer::new(
            key,
            &settings.model_name,
            settings.max_tokens,
            &settings.user_agent,
        )?)),
        None => {
            tracing::warn!(target: "enrich", "no ANTHROPIC_API_KEY, articles will be skipped");
            Ok(Arc::new(DisabledSummarizer))
        }
    }
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}

/// Run enrichment over the collected articles, mutating them in place.
/// Input order is preserved in the output.
pub async fn run(
    mut articles: Vec<Article>,
    summarizer: Arc<dyn Summarize>,
    policy: RetryPolicy,
    max_concurrency: usize,
    stage_timeout: Duration,
) -> (Vec<Article>, Vec<FailureRecord>) {
    if !summarizer.enabled() {
        for article in &mut articles {
            article.enrichment_status = EnrichmentStatus::Skipped;
            article.importance = Importance::B;
        }
        tracing::info!(target: "enrich", articles = articles.len(), "enrichment skipped");
        return (articles, Vec::new());
    }

    tracing::info!(
        target: "enrich",
        articles = articles.len(),
        max_concurrency,
        "enrichment stage starting"
    );

    let ops: Vec<(String, _)> = articles
        .iter()
        .map(|article| {
            let key = article.key();
            let title = article.title.clone();
            let content = article.raw_content.clone();
            let summarizer = summarizer.clone();
            let fut = {
                let key = key.clone();
                async move {
                    let outcome = retry(&policy, &key, |attempt| {
                        let summarizer = summarizer.clone();
                        let title = title.clone();
                        let content = content.clone();
                        async move {
                            tracing::debug!(target: "enrich", article = %title, attempt, "summarizing");
                            summarizer.summarize(&title, &content).await
                        }
                    })
                    .await;
                    Ok::<_, StageError>(outcome)
                }
            };
            (key, fut)
        })
        .collect();

    let settled = run_bounded(max_concurrency, stage_timeout, ops).await;
    let mut by_key: HashMap<String, _> = settled.into_iter().collect();

    let mut failures = Vec::new();
    for article in &mut articles {
        match by_key.remove(&article.key()) {
            Some(Ok(Ok(summary))) => {
                article.summary =
                    (!summary.summary.trim().is_empty()).then(|| summary.summary.trim().to_string());
                article.tags = dedup_tags(summary.tags);
                article.importance = summary.importance;
                article.enrichment_status = EnrichmentStatus::Ok;
            }
            Some(Ok(Err(retry_err))) => {
                degrade(article);
                failures.push(FailureRecord {
                    stage: Stage::Enrichment,
                    subject: article.key(),
                    error_kind: retry_err.error.kind().to_string(),
                    attempt_count: retry_err.attempts,
                    message: retry_err.error.to_string(),
                });
            }
            Some(Err(stage_err)) => {
                degrade(article);
                failures.push(FailureRecord {
                    stage: Stage::Enrichment,
                    subject: article.key(),
                    error_kind: stage_err.kind().to_string(),
                    attempt_count: 1,
                    message: stage_err.to_string(),
                });
            }
            // A panicked task loses its key in the limiter; degrade rather
            // than leave the article half-enriched.
            None => {
                degrade(article);
                failures.push(FailureRecord {
                    stage: Stage::Enrichment,
                    subject: article.key(),
                    error_kind: "task".to_string(),
                    attempt_count: 1,
                    message: "enrichment task did not settle".to_string(),
                });
            }
        }
    }

    let ok = articles
        .iter()
        .filter(|a| a.enrichment_status == EnrichmentStatus::Ok)
        .count();
    tracing::info!(
        target: "enrich",
        ok,
        failed = failures.len(),
        "enrichment stage finished"
    );
    (articles, failures)
}

fn degrade(article: &mut Article) {
    article.summary = None;
    article.tags = Vec::new();
    article.importance = Importance::B;
    article.enrichment_status = EnrichmentStatus::Failed;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(n: usize) -> Article {
        Article::raw(
            "src",
            &format!("https://s.test/{n}"),
            &format!("Title {n}"),
            "body".to_string(),
        )
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)).without_jitter()
    }

    struct FailsOne;

    #[async_trait]
    impl Summarize for FailsOne {
        async fn summarize(&self, title: &str, _c: &str) -> Result<Summary, StageError> {
            if title == "Title 1" {
                Err(StageError::RateLimited)
            } else {
                Ok(Summary {
                    summary: format!("sum {title}"),
                    tags: vec!["Rust".into(), "rust".into(), " ".into()],
                    importance: Importance::S,
                })
            }
        }
    }

    #[tokio::test]
    async fn failed_article_is_degraded_not_dropped() {
        let input = vec![article(0), article(1), article(2)];
        let (out, failures) = run(
            input,
            Arc::new(FailsOne),
            fast_policy(),
            2,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].enrichment_status, EnrichmentStatus::Ok);
        assert_eq!(out[0].importance, Importance::S);
        assert_eq!(out[0].tags, vec!["Rust".to_string()]); // deduped, trimmed

        assert_eq!(out[1].enrichment_status, EnrichmentStatus::Failed);
        assert_eq!(out[1].importance, Importance::B);
        assert!(out[1].summary.is_none());
        assert!(out[1].tags.is_empty());

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subject, "src::https://s.test/1");
        assert_eq!(failures[0].attempt_count, 3);
        assert_eq!(failures[0].stage, Stage::Enrichment);
    }

    #[tokio::test]
    async fn disabled_summarizer_marks_all_skipped() {
        let input = vec![article(0), article(1)];
        let (out, failures) = run(
            input,
            Arc::new(DisabledSummarizer),
            fast_policy(),
            2,
            Duration::from_secs(5),
        )
        .await;
        assert!(failures.is_empty());
        for a in &out {
            assert_eq!(a.enrichment_status, EnrichmentStatus::Skipped);
            assert_eq!(a.importance, Importance::B);
        }
    }

    #[tokio::test]
    async fn importance_is_always_defined_after_stage() {
        struct AlwaysFails;
        #[async_trait]
        impl Summarize for AlwaysFails {
            async fn summarize(&self, _t: &str, _c: &str) -> Result<Summary, StageError> {
                Err(StageError::Malformed("junk".into()))
            }
        }

        let input = vec![article(0), article(1)];
        let (out, failures) = run(
            input,
            Arc::new(AlwaysFails),
            fast_policy(),
            2,
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(failures.len(), 2);
        // Malformed responses are not retried
        assert!(failures.iter().all(|f| f.attempt_count == 1));
        assert!(out
            .iter()
            .all(|a| matches!(a.importance, Importance::S | Importance::A | Importance::B)));
    }

    #[tokio::test]
    async fn empty_input_is_a_noop() {
        let (out, failures) = run(
            Vec::new(),
            Arc::new(MockSummarizer),
            fast_policy(),
            2,
            Duration::from_secs(5),
        )
        .await;
        assert!(out.is_empty());
        assert!(failures.is_empty());
    }
}
