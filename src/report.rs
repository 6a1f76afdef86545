// src/report.rs
// Daily report assembly and Markdown rendering. Rendering happens exactly
// once per run; sinks receive the same artifact.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Article, Importance};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub generated_at: DateTime<Utc>,
    pub total_articles: usize,
    pub by_importance: BTreeMap<Importance, usize>,
    pub articles: Vec<Article>,
}

impl DailyReport {
    /// Build the report: sort by importance rank, then source, then title,
    /// and keep the top `top_n`. An empty article list yields a well-formed
    /// empty-body report.
    pub fn build(articles: &[Article], top_n: usize) -> Self {
        let mut sorted: Vec<Article> = articles.to_vec();
        sorted.sort_by(|a, b| {
            a.importance
                .cmp(&b.importance)
                .then_with(|| a.source_name.cmp(&b.source_name))
                .then_with(|| a.title.cmp(&b.title))
        });
        sorted.truncate(top_n);

        let mut by_importance = BTreeMap::new();
        for a in &sorted {
            *by_importance.entry(a.importance).or_insert(0) += 1;
        }

        Self {
            generated_at: Utc::now(),
            total_articles: sorted.len(),
            by_importance,
            articles: sorted,
        }
    }

    /// Run-stamped artifact name, one per run.
    pub fn artifact_name(&self) -> String {
        format!(
            "daily_report_{}.md",
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn title(&self) -> String {
        format!(
            "Daily IT Trend Report {}",
            self.generated_at.format("%Y-%m-%d")
        )
    }

    pub fn to_markdown(&self) -> String {
        let mut md = Vec::new();
        md.push(format!("# {}", self.title()));
        md.push(format!(
            "**Generated:** {}",
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        ));
        md.push(format!("**Total Articles:** {}", self.total_articles));
        md.push(String::new());
        md.push("## Summary".to_string());
        md.push(String::new());
        for rank in [Importance::S, Importance::A, Importance::B] {
            let count = self.by_importance.get(&rank).copied().unwrap_or(0);
            md.push(format!("- **{rank} Rank:** {count} articles"));
        }
        md.push(String::new());
        md.push("---".to_string());
        md.push(String::new());

        for rank in [Importance::S, Importance::A, Importance::B] {
            let grouped: Vec<&Article> = self
                .articles
                .iter()
                .filter(|a| a.importance == rank)
                .collect();
            if grouped.is_empty() {
                continue;
            }
            md.push(format!("## {rank} Rank Articles ({})", grouped.len()));
            md.push(String::new());
            for article in grouped {
                md.push(format!("### [{}]({})", article.title, article.url));
                md.push(format!("**Source:** {}", article.source_name));
                if let Some(published) = article.published_at {
                    md.push(format!(
                        "**Published:** {}",
                        published.format("%Y-%m-%d %H:%M")
                    ));
                }
                md.push(String::new());
                if let Some(summary) = &article.summary {
                    md.push("**Summary:**".to_string());
                    md.push(summary.clone());
                    md.push(String::new());
                }
                if !article.tags.is_empty() {
                    let tags: Vec<String> =
                        article.tags.iter().map(|t| format!("`{t}`")).collect();
                    md.push(format!("**Tags:** {}", tags.join(", ")));
                }
                md.push(String::new());
                md.push("---".to_string());
                md.push(String::new());
            }
        }

        md.join("\n")
    }
}
