// src/config.rs
// Runtime settings from environment variables (plus .env via dotenvy in the
// binary) and the declarative source list from config/sources.toml.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_SOURCES_PATH: &str = "SOURCES_PATH";
pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Html,
    Rss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Browser,
    Static,
    Feed,
}

fn default_max_articles() -> usize {
    10
}
fn default_enabled() -> bool {
    true
}

/// One configured origin. Loaded once per run, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub method: FetchMethod,
    /// CSS selector mapping consumed only by the fetch capability
    /// (keys: article_list, article_link, article_title).
    #[serde(default)]
    pub selectors: BTreeMap<String, String>,
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn selector(&self, key: &str, fallback: &str) -> String {
        self.selectors
            .get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: Vec<SourceConfig>,
}

/// Load the source list from an explicit TOML path.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let file: SourcesFile =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    // Names must be unique; article identity is (source_name, url).
    let mut seen = std::collections::BTreeSet::new();
    for s in &file.sources {
        if !seen.insert(s.name.as_str()) {
            return Err(anyhow!("duplicate source name: {}", s.name));
        }
    }
    Ok(file.sources)
}

/// Load sources using $SOURCES_PATH, falling back to config/sources.toml.
pub fn load_sources_default() -> Result<Vec<SourceConfig>> {
    if let Ok(p) = env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        }
        return Err(anyhow!("SOURCES_PATH points to non-existent path"));
    }
    load_sources_from(Path::new(DEFAULT_SOURCES_PATH))
}

/// Immutable process settings, resolved once in `main` and passed down
/// explicitly. No ambient global state.
#[derive(Debug, Clone)]
pub struct Settings {
    // Enrichment (Claude)
    pub anthropic_api_key: Option<String>,
    pub model_name: String,
    pub max_tokens: u32,
    pub enrich_enabled: bool,

    // Workspace publication (Notion)
    pub notion_api_key: Option<String>,
    pub notion_parent_page_id: Option<String>,

    // Stage limits
    pub fetch_concurrency: usize,
    pub enrich_concurrency: usize,
    pub collect_timeout: Duration,
    pub enrich_timeout: Duration,
    pub publish_timeout: Duration,

    // Retry
    pub max_retry_attempts: u32,
    pub retry_base_delay: Duration,

    // Output
    pub output_dir: PathBuf,
    pub report_top_n: usize,
    pub user_agent: String,

    /// Only keep articles published within this window; undated articles
    /// always pass. 0 disables the filter.
    pub hours_lookback: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            model_name: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 1024,
            enrich_enabled: false,
            notion_api_key: None,
            notion_parent_page_id: None,
            fetch_concurrency: 5,
            enrich_concurrency: 3,
            collect_timeout: Duration::from_secs(120),
            enrich_timeout: Duration::from_secs(300),
            publish_timeout: Duration::from_secs(60),
            max_retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            output_dir: PathBuf::from("output"),
            report_top_n: 10,
            user_agent: concat!("trend-digest/", env!("CARGO_PKG_VERSION")).to_string(),
            hours_lookback: 24,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Settings::default();
        let anthropic_api_key = env_opt("ANTHROPIC_API_KEY");
        let enrich_enabled = match env::var("ENRICH_ENABLED").ok().as_deref() {
            Some("0") | Some("false") => false,
            _ => anthropic_api_key.is_some(),
        };
        Self {
            enrich_enabled,
            anthropic_api_key,
            model_name: env::var("MODEL_NAME").unwrap_or(d.model_name),
            max_tokens: env_num("MAX_TOKENS", d.max_tokens),
            notion_api_key: env_opt("NOTION_API_KEY"),
            notion_parent_page_id: env_opt("NOTION_PARENT_PAGE_ID"),
            fetch_concurrency: env_num("FETCH_CONCURRENCY", d.fetch_concurrency).max(1),
            enrich_concurrency: env_num("ENRICH_CONCURRENCY", d.enrich_concurrency).max(1),
            collect_timeout: Duration::from_secs(env_num(
                "COLLECT_TIMEOUT_SECS",
                d.collect_timeout.as_secs(),
            )),
            enrich_timeout: Duration::from_secs(env_num(
                "ENRICH_TIMEOUT_SECS",
                d.enrich_timeout.as_secs(),
            )),
            publish_timeout: Duration::from_secs(env_num(
                "PUBLISH_TIMEOUT_SECS",
                d.publish_timeout.as_secs(),
            )),
            max_retry_attempts: env_num("MAX_RETRY_ATTEMPTS", d.max_retry_attempts).max(1),
            retry_base_delay: Duration::from_millis(env_num(
                "RETRY_BASE_MS",
                d.retry_base_delay.as_millis() as u64,
            )),
            output_dir: env::var("OUTPUT_DIR").map(PathBuf::from).unwrap_or(d.output_dir),
            report_top_n: env_num("REPORT_TOP_N", d.report_top_n).max(1),
            user_agent: env::var("USER_AGENT").unwrap_or(d.user_agent),
            hours_lookback: env_num("HOURS_LOOKBACK", d.hours_lookback),
        }
    }

    pub fn retry_policy(&self) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy::new(
            self.max_retry_attempts,
            self.retry_base_delay,
            Duration::from_secs(10),
        )
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_num<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => match v.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(key, value = %v, "unparseable numeric env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}
