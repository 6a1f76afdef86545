// src/enrich/claude.rs
// Claude Messages API client for article classification. The model is asked
// for a strict JSON object; responses wrapped in markdown fences are
// tolerated and missing fields fall back to safe defaults.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::StageError;
use crate::model::Importance;

use super::{Summarize, Summary};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeSummarizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeSummarizer {
    pub fn new(
        api_key: &str,
        model: &str,
        max_tokens: u32,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
        })
    }
}

fn build_prompt(title: &str, raw_content: &str) -> String {
    let body = if raw_content.is_empty() {
        "(no content captured; judge from the title alone)".to_string()
    } else {
        raw_content.to_string()
    };
    format!(
        r#"You are an analyst of engineering news. Analyze the article below.

Title: {title}
Content: {body}

Respond with a single JSON object and nothing else:

{{
  "summary": "At most three sentences aimed at working engineers.",
  "tags": ["tag1", "tag2"],
  "importance": "S"
}}

Importance rubric:
- "S": industry-wide impact (major releases, breaking changes, serious
  vulnerabilities, new standards, landmark AI/ML announcements).
- "A": practical trends engineers should know (feature updates, tutorials,
  performance work, notable tools and libraries).
- "B": general information or personal experience write-ups.

Tags: languages, frameworks, cloud/infra, other technical keywords; at most five."#
    )
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct RawSummary {
    summary: Option<String>,
    tags: Option<Vec<String>>,
    importance: Option<String>,
}

/// Parse the model's reply. Models occasionally wrap JSON in ```json fences;
/// strip them before parsing. Unparseable replies are `Malformed` (and thus
/// not retried); missing fields default instead of failing.
pub fn parse_summary(text: &str) -> Result<Summary, StageError> {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    let raw: RawSummary = serde_json::from_str(s.trim())
        .map_err(|e| StageError::Malformed(format!("summary json: {e}")))?;

    Ok(Summary {
        summary: raw.summary.unwrap_or_default(),
        tags: raw.tags.unwrap_or_default(),
        importance: raw
            .importance
            .as_deref()
            .map(Importance::from_response)
            .unwrap_or(Importance::B),
    })
}

#[async_trait]
impl Summarize for ClaudeSummarizer {
    async fn summarize(&self, title: &str, raw_content: &str) -> Result<Summary, StageError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": build_prompt(title, raw_content) }],
        });

        let resp = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(StageError::RateLimited);
        }
        if status.is_server_error() {
            return Err(StageError::Api(format!("http status {status}")));
        }
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(StageError::Malformed(format!(
                "http status {status}: {detail}"
            )));
        }

        let parsed: ApiResponse = resp
            .json()
            .await
            .map_err(|e| StageError::Malformed(format!("api response: {e}")))?;
        let text = parsed
            .content
            .first()
            .map(|c| c.text.as_str())
            .unwrap_or_default();
        parse_summary(text)
    }
}
