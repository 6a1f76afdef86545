// src/model.rs
// Data model for one pipeline run. Nothing here survives across runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Importance rank assigned by the enrichment capability.
/// `B` is the fallback when enrichment fails or is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Importance {
    S,
    A,
    B,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::S => "S",
            Importance::A => "A",
            Importance::B => "B",
        }
    }

    /// Lenient parse used on capability responses; anything unknown maps to `B`.
    pub fn from_response(s: &str) -> Self {
        match s.trim() {
            "S" => Importance::S,
            "A" => Importance::A,
            _ => Importance::B,
        }
    }
}

impl Default for Importance {
    fn default() -> Self {
        Importance::B
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Ok,
    Failed,
    Skipped,
}

/// One collected article. Created by the collection stage, enriched in place,
/// read-only from the publication stage on. Identity within a run is
/// `(source_name, url)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub source_name: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub raw_content: String,
    pub fetched_at: DateTime<Utc>,
    /// Upstream publication time, when the source exposes one (feeds do).
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    // Enrichment results. Defaults hold until the enrichment stage runs.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub importance: Importance,
    pub enrichment_status: EnrichmentStatus,
}

impl Article {
    pub fn raw(source_name: &str, url: &str, title: &str, raw_content: String) -> Self {
        Self {
            source_name: source_name.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            raw_content,
            fetched_at: Utc::now(),
            published_at: None,
            summary: None,
            tags: Vec::new(),
            importance: Importance::B,
            enrichment_status: EnrichmentStatus::Skipped,
        }
    }

    /// Run-local identity key.
    pub fn key(&self) -> String {
        format!("{}::{}", self.source_name, self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Collection,
    Enrichment,
    Publication,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Collection => "collection",
            Stage::Enrichment => "enrichment",
            Stage::Publication => "publication",
        };
        f.write_str(s)
    }
}

/// A caught, non-fatal per-item failure. Never re-thrown past its stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub stage: Stage,
    /// Source name, article key, or sink name.
    pub subject: String,
    pub error_kind: String,
    pub attempt_count: u32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

/// Aggregate outcome of one pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub articles: Vec<Article>,
    pub failures: Vec<FailureRecord>,
    /// Collected counts per enabled source; fully-failed sources appear with 0.
    pub per_source_counts: BTreeMap<String, usize>,
    pub publish_results: BTreeMap<String, PublishOutcome>,
    pub status: RunStatus,
}

impl RunResult {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_parse_is_lenient() {
        assert_eq!(Importance::from_response(" S "), Importance::S);
        assert_eq!(Importance::from_response("A"), Importance::A);
        assert_eq!(Importance::from_response("B"), Importance::B);
        assert_eq!(Importance::from_response("weird"), Importance::B);
        assert_eq!(Importance::from_response(""), Importance::B);
    }

    #[test]
    fn article_key_combines_source_and_url() {
        let a = Article::raw("HN", "https://example.test/x", "T", String::new());
        assert_eq!(a.key(), "HN::https://example.test/x");
    }
}
