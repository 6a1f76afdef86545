// src/collect/browser.rs
// Browser-rendered fetch: headless chromium --dump-dom into a throwaway
// profile, then the same selector extraction as the static path. Retries are
// handled by the stage's retry policy, not here.

use std::time::Duration;

use crate::collect::static_html;
use crate::config::SourceConfig;
use crate::error::StageError;
use crate::model::Article;

const DUMP_TIMEOUT: Duration = Duration::from_secs(30);

async fn dump_dom(url: &str) -> Result<String, StageError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| StageError::Config(format!("browser source url {url}: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(StageError::Config(format!(
            "only http/https urls are allowed, got {}",
            parsed.scheme()
        )));
    }

    let chrome_bin = std::env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".to_string());
    let profile = tempfile::tempdir()
        .map_err(|e| StageError::Task(format!("temp profile dir: {e}")))?;

    let output = tokio::time::timeout(
        DUMP_TIMEOUT,
        tokio::process::Command::new(&chrome_bin)
            .args([
                "--headless",
                "--no-sandbox",
                "--disable-gpu",
                "--disable-dev-shm-usage",
                &format!("--user-data-dir={}", profile.path().display()),
                "--dump-dom",
                url,
            ])
            .output(),
    )
    .await
    .map_err(|_| StageError::Timeout)?
    .map_err(|e| StageError::Network(format!("launching {chrome_bin}: {e}")))?;

    if !output.status.success() {
        return Err(StageError::Network(format!(
            "{chrome_bin} exited with {}",
            output.status
        )));
    }
    if output.stdout.is_empty() {
        return Err(StageError::Network("browser returned an empty DOM".into()));
    }
    String::from_utf8(output.stdout)
        .map_err(|e| StageError::Malformed(format!("non-utf8 DOM dump: {e}")))
}

pub async fn fetch(source: &SourceConfig) -> Result<Vec<Article>, StageError> {
    let dom = dump_dom(&source.url).await?;
    tracing::debug!(
        target: "collect",
        source = %source.name,
        dom_bytes = dom.len(),
        "browser dump complete"
    );
    static_html::extract_articles(source, &dom)
}
