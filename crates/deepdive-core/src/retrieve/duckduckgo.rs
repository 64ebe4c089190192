use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{ContentItem, RetrievalError, Retriever};
use crate::config::{
    RetrievalConfig, DEFAULT_DUCKDUCKGO_URL, DEFAULT_INITIAL_RETRY_DELAY_MS, DEFAULT_MAX_RESULTS,
    DEFAULT_MAX_RETRIES, DEFAULT_USER_AGENT,
};

/// One organic search result. Serialized as the content of a [`ContentItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Searches DuckDuckGo's HTML endpoint.
///
/// Rate-limit responses (429, or DuckDuckGo's 202 challenge page) are retried
/// with exponential backoff.
pub struct DuckDuckGoRetriever {
    client: Client,
    base_url: String,
    max_results: usize,
    max_retries: u32,
    initial_delay: Duration,
}

impl Default for DuckDuckGoRetriever {
    fn default() -> Self {
        Self::new(DEFAULT_DUCKDUCKGO_URL)
    }
}

impl DuckDuckGoRetriever {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            max_results: DEFAULT_MAX_RESULTS,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_RETRY_DELAY_MS),
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_DUCKDUCKGO_URL.to_string());
        Self::new(base_url)
            .with_max_results(config.max_results)
            .with_retries(
                config.max_retries,
                Duration::from_millis(config.initial_retry_delay_ms),
            )
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_delay = initial_delay;
        self
    }

    async fn search_once(&self, query: &str) -> Result<Vec<SearchHit>, RetrievalError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .header("user-agent", DEFAULT_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if status == 429 || status == 202 {
            return Err(RetrievalError::RateLimited);
        }
        if !status.is_success() {
            return Err(RetrievalError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_results(&body, self.max_results)
    }
}

/// Doubles a backoff delay, pinned at `Duration::MAX`.
fn next_delay(delay: Duration) -> Duration {
    delay.saturating_mul(2)
}

#[async_trait]
impl Retriever for DuckDuckGoRetriever {
    async fn search(&self, query: &str) -> Result<Vec<ContentItem>, RetrievalError> {
        let attempts = self.max_retries.max(1);
        let mut delay = self.initial_delay;

        for attempt in 1..=attempts {
            match self.search_once(query).await {
                Err(RetrievalError::RateLimited) if attempt < attempts => {
                    warn!(query, attempt, ?delay, "rate limited, backing off");
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay);
                }
                Err(e) => return Err(e),
                Ok(hits) => {
                    debug!(query, hits = hits.len(), "search complete");
                    return hits
                        .into_iter()
                        .map(|hit| {
                            let content = serde_json::to_string(&hit)
                                .map_err(|e| RetrievalError::Parse(e.to_string()))?;
                            Ok(ContentItem::new(content, hit.link))
                        })
                        .collect();
                }
            }
        }

        Err(RetrievalError::RateLimited)
    }
}

fn selector(css: &str) -> Result<Selector, RetrievalError> {
    Selector::parse(css).map_err(|e| RetrievalError::Parse(format!("selector {css}: {e}")))
}

/// Extracts up to `max_results` organic results from a DuckDuckGo HTML page.
fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchHit>, RetrievalError> {
    let document = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let link_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut hits = Vec::new();
    for result in document.select(&result_sel) {
        if hits.len() >= max_results {
            break;
        }
        if result.value().classes().any(|class| class == "result--ad") {
            continue;
        }

        let Some(anchor) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(link) = anchor.value().attr("href").and_then(resolve_link) else {
            continue;
        };

        hits.push(SearchHit {
            title: element_text(anchor),
            link,
            snippet: result
                .select(&snippet_sel)
                .next()
                .map(element_text)
                .unwrap_or_default(),
        });
    }

    Ok(hits)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwraps DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=<target>`).
fn resolve_link(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    if url.path() == "/l/" {
        return url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned());
    }

    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}
