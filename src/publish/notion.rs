// src/publish/notion.rs
// Notion workspace sink: creates one child page per run under a configured
// parent page via the REST API. Markdown is carried as paragraph blocks;
// Notion caps rich-text content at 2000 chars per block, so the body is
// chunked well under that.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::StageError;
use crate::report::DailyReport;

use super::Sink;

const API_URL: &str = "https://api.notion.com/v1/pages";
const API_VERSION: &str = "2022-06-28";
const BLOCK_CHUNK_CHARS: usize = 1800;

pub struct NotionSink {
    http: reqwest::Client,
    api_key: String,
    parent_page_id: String,
}

impl NotionSink {
    pub fn new(api_key: &str, parent_page_id: &str, user_agent: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            parent_page_id: parent_page_id.to_string(),
        })
    }
}

fn paragraph_block(text: &str) -> Value {
    json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": {
            "rich_text": [{ "type": "text", "text": { "content": text } }]
        }
    })
}

/// Split the markdown body into paragraph blocks on blank lines, re-chunking
/// anything that would exceed the per-block limit.
pub fn markdown_to_blocks(markdown: &str) -> Vec<Value> {
    let mut blocks = Vec::new();
    for paragraph in markdown.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let chars: Vec<char> = paragraph.chars().collect();
        for chunk in chars.chunks(BLOCK_CHUNK_CHARS) {
            blocks.push(paragraph_block(&chunk.iter().collect::<String>()));
        }
    }
    blocks
}

#[async_trait]
impl Sink for NotionSink {
    fn name(&self) -> &'static str {
        "workspace"
    }

    async fn publish(&self, report: &DailyReport, markdown: &str) -> Result<(), StageError> {
        let body = json!({
            "parent": { "page_id": self.parent_page_id },
            "properties": {
                "title": [{ "type": "text", "text": { "content": report.title() } }]
            },
            "children": markdown_to_blocks(markdown),
        });

        let resp = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| StageError::Sink(format!("notion request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(StageError::Sink(format!(
                "notion rejected page: {status} {detail}"
            )));
        }

        let page: Value = resp
            .json()
            .await
            .map_err(|e| StageError::Sink(format!("notion response: {e}")))?;
        tracing::info!(
            target: "publish",
            url = page.get("url").and_then(|u| u.as_str()).unwrap_or("?"),
            "notion page created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines() {
        let blocks = markdown_to_blocks("# Title\n\nFirst para\n\nSecond para");
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0]["paragraph"]["rich_text"][0]["text"]["content"],
            "# Title"
        );
    }

    #[test]
    fn rechunks_oversized_paragraphs() {
        let long = "x".repeat(BLOCK_CHUNK_CHARS * 2 + 10);
        let blocks = markdown_to_blocks(&long);
        assert_eq!(blocks.len(), 3);
        for b in &blocks {
            let content = b["paragraph"]["rich_text"][0]["text"]["content"]
                .as_str()
                .unwrap();
            assert!(content.chars().count() <= BLOCK_CHUNK_CHARS);
        }
    }

    #[test]
    fn empty_markdown_yields_no_blocks() {
        assert!(markdown_to_blocks("\n\n  \n\n").is_empty());
    }
}
