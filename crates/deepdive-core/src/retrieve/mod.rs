//! Content retrieval for research queries.
//!
//! Backends implement [`Retriever`] and may fail; the research loop only ever
//! sees [`ContentRetriever`], which turns every failure into zero items.

mod command;
mod duckduckgo;

pub use command::CommandRetriever;
pub use duckduckgo::{DuckDuckGoRetriever, SearchHit};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;

/// A piece of retrieved content and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub content: String,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
}

impl ContentItem {
    pub fn new(content: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_url: source_url.into(),
        }
    }
}

/// Errors raised by retrieval backends.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search backend returned status {0}")]
    Status(u16),

    #[error("Rate limited by search backend")]
    RateLimited,

    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to parse search results: {0}")]
    Parse(String),

    #[error("Unknown retrieval backend: {0}")]
    UnknownBackend(String),

    #[error("The command backend needs a program to run")]
    MissingCommand,
}

/// A search backend: query in, content items out.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<ContentItem>, RetrievalError>;
}

#[async_trait]
impl<R: Retriever + ?Sized> Retriever for Arc<R> {
    async fn search(&self, query: &str) -> Result<Vec<ContentItem>, RetrievalError> {
        (**self).search(query).await
    }
}

/// Builds the backend named in the config.
pub fn from_config(config: &RetrievalConfig) -> Result<Arc<dyn Retriever>, RetrievalError> {
    match config.backend.as_str() {
        "duckduckgo" | "ddg" => Ok(Arc::new(DuckDuckGoRetriever::from_config(config))),
        "command" => {
            let program = config.command.clone().ok_or(RetrievalError::MissingCommand)?;
            Ok(Arc::new(
                CommandRetriever::new(program).with_args(config.args.clone()),
            ))
        }
        other => Err(RetrievalError::UnknownBackend(other.to_string())),
    }
}

/// Infallible front for a [`Retriever`].
#[derive(Clone)]
pub struct ContentRetriever {
    inner: Arc<dyn Retriever>,
}

impl ContentRetriever {
    pub fn new(inner: Arc<dyn Retriever>) -> Self {
        Self { inner }
    }

    /// Retrieves content for `query`. Backend errors are logged and yield an
    /// empty list.
    pub async fn retrieve(&self, query: &str) -> Vec<ContentItem> {
        match self.inner.search(query).await {
            Ok(items) => {
                debug!(query, items = items.len(), "retrieved content");
                items
            }
            Err(e) => {
                warn!(query, error = %e, "retrieval failed, continuing without content");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl Retriever for Failing {
        async fn search(&self, _query: &str) -> Result<Vec<ContentItem>, RetrievalError> {
            Err(RetrievalError::Parse("garbage".to_string()))
        }
    }

    struct Fixed;

    #[async_trait]
    impl Retriever for Fixed {
        async fn search(&self, query: &str) -> Result<Vec<ContentItem>, RetrievalError> {
            Ok(vec![ContentItem::new(query, "https://example.com")])
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_empty() {
        let retriever = ContentRetriever::new(Arc::new(Failing));
        assert!(retriever.retrieve("anything").await.is_empty());
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let retriever = ContentRetriever::new(Arc::new(Fixed));
        let items = retriever.retrieve("rust").await;
        assert_eq!(items, vec![ContentItem::new("rust", "https://example.com")]);
    }

    #[test]
    fn test_content_item_wire_names() {
        let item = ContentItem::new("text", "https://a.example");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["sourceURL"], "https://a.example");
    }

    #[test]
    fn test_from_config_backends() {
        assert!(from_config(&RetrievalConfig::default()).is_ok());

        let config = RetrievalConfig {
            backend: "bing".to_string(),
            ..RetrievalConfig::default()
        };
        assert!(matches!(from_config(&config), Err(RetrievalError::UnknownBackend(_))));

        let config = RetrievalConfig {
            backend: "command".to_string(),
            command: Some("crawl".to_string()),
            ..RetrievalConfig::default()
        };
        assert!(from_config(&config).is_ok());
    }

    #[test]
    fn test_command_backend_without_program() {
        let config = RetrievalConfig {
            backend: "command".to_string(),
            command: None,
            ..RetrievalConfig::default()
        };
        assert!(matches!(from_config(&config), Err(RetrievalError::MissingCommand)));
    }
}
