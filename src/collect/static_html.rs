// src/collect/static_html.rs
// Static-page fetch: HTTP GET + CSS selector extraction over the parsed DOM.
// The same extraction runs over browser-rendered DOM dumps (see browser.rs).

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::SourceConfig;
use crate::error::StageError;
use crate::model::Article;
use crate::text;

fn parse_selector(raw: &str, key: &str) -> Result<Selector, StageError> {
    Selector::parse(raw)
        .map_err(|e| StageError::Config(format!("bad {key} selector {raw:?}: {e}")))
}

fn link_href<'a>(element: &ElementRef<'a>, link_sel: &Selector) -> Option<(ElementRef<'a>, String)> {
    // The list selector may already match anchors directly.
    if element.value().name() == "a" {
        if let Some(href) = element.value().attr("href") {
            return Some((*element, href.to_string()));
        }
    }
    let link = element.select(link_sel).next()?;
    let href = link.value().attr("href")?;
    Some((link, href.to_string()))
}

/// Extract articles from an HTML document using the source's selector map.
/// Selector keys and defaults: article_list (`article`), article_link (`a`),
/// article_title (`h2, h3`).
pub fn extract_articles(source: &SourceConfig, html: &str) -> Result<Vec<Article>, StageError> {
    let base = Url::parse(&source.url)
        .map_err(|e| StageError::Config(format!("source url {}: {e}", source.url)))?;
    let list_sel = parse_selector(&source.selector("article_list", "article"), "article_list")?;
    let link_sel = parse_selector(&source.selector("article_link", "a"), "article_link")?;
    let title_sel =
        parse_selector(&source.selector("article_title", "h2, h3"), "article_title")?;

    let doc = Html::parse_document(html);
    let mut out = Vec::new();

    for element in doc.select(&list_sel) {
        if out.len() >= source.max_articles {
            break;
        }
        let Some((link, href)) = link_href(&element, &link_sel) else {
            continue;
        };
        let Ok(url) = base.join(href.trim()) else {
            continue;
        };

        let title_text = element
            .select(&title_sel)
            .next()
            .map(|t| t.text().collect::<String>())
            .unwrap_or_else(|| link.text().collect::<String>());
        let title = text::clean_title(&title_text);

        let raw_content = text::clean_fragment(&element.text().collect::<String>());
        out.push(Article::raw(&source.name, url.as_str(), &title, raw_content));
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
    extract_articles(source, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchMethod, SourceType};
    use std::collections::BTreeMap;

    fn html_source(selectors: &[(&str, &str)], max_articles: usize) -> SourceConfig {
        SourceConfig {
            name: "Tech Site".to_string(),
            url: "https://tech.test/news/".to_string(),
            source_type: SourceType::Html,
            method: FetchMethod::Static,
            selectors: selectors
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            max_articles,
            enabled: true,
        }
    }

    const PAGE: &str = r#"<html><body>
      <article>
        <h2>First &amp; Foremost</h2>
        <a href="/posts/1">read</a>
        <p>Body one</p>
      </article>
      <article>
        <h3>Second</h3>
        <a href="https://other.test/abs">read</a>
      </article>
      <article><p>no link</p></article>
    </body></html>"#;

    #[test]
    fn extracts_with_defaults_and_resolves_relative_links() {
        let out = extract_articles(&html_source(&[], 10), PAGE).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "First & Foremost");
        assert_eq!(out[0].url, "https://tech.test/posts/1");
        assert!(out[0].raw_content.contains("Body one"));
        assert_eq!(out[1].url, "https://other.test/abs");
    }

    #[test]
    fn anchor_list_selector_uses_link_text_as_title() {
        let page = r#"<div><a class="story" href="/s/1">Big Story</a></div>"#;
        let src = html_source(&[("article_list", "a.story")], 10);
        let out = extract_articles(&src, page).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Big Story");
        assert_eq!(out[0].url, "https://tech.test/s/1");
    }

    #[test]
    fn respects_max_articles() {
        let out = extract_articles(&html_source(&[], 1), PAGE).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn invalid_selector_is_config_error() {
        let src = html_source(&[("article_list", ":::nope")], 10);
        let err = extract_articles(&src, PAGE).unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(!err.is_retryable());
    }

    #[test]
    fn empty_page_yields_empty_list() {
        let out = extract_articles(&html_source(&[], 10), "<html></html>").unwrap();
        assert!(out.is_empty());
    }
}
