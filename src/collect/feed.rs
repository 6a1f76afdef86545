// src/collect/feed.rs
// RSS fetch: HTTP GET + typed quick-xml deserialization.

use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::config::SourceConfig;
use crate::error::StageError;
use crate::model::Article;
use crate::text;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

// Feeds in the wild leak bare HTML entities into otherwise valid XML.
fn scrub_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

pub fn parse_feed(source: &SourceConfig, body: &str) -> Result<Vec<Article>, StageError> {
    let clean = scrub_entities_for_xml(body);
    let rss: Rss =
        from_str(&clean).map_err(|e| StageError::Malformed(format!("rss parse: {e}")))?;

    let mut out = Vec::new();
    for item in rss.channel.item.into_iter().take(source.max_articles) {
        let url = match item.link {
            Some(l) if !l.trim().is_empty() => l.trim().to_string(),
            _ => continue,
        };
        let title = text::clean_title(item.title.as_deref().unwrap_or_default());
        let raw_content = text::clean_fragment(item.description.as_deref().unwrap_or_default());

        let mut article = Article::raw(&source.name, &url, &title, raw_content);
        article.published_at = item.pub_date.as_deref().and_then(parse_rfc2822);
        out.push(article);
    }
    Ok(out)
}

pub async fn fetch(
    client: &reqwest::Client,
    source: &SourceConfig,
) -> Result<Vec<Article>, StageError> {
    let resp = client.get(&source.url).send().await?;
    let resp = resp.error_for_status().map_err(StageError::from)?;
    let body = resp.text().await?;
    parse_feed(source, &body)
}
