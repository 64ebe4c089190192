use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{ContentItem, RetrievalError, Retriever};

/// Runs an external crawler program per query.
///
/// The query is passed as the last argument. The program must print a JSON
/// array on stdout:
///
/// ```text
/// [{"content": "...", "metadata": {"sourceURL": "https://..."}}]
/// ```
pub struct CommandRetriever {
    program: String,
    args: Vec<String>,
}

impl CommandRetriever {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the query.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

#[derive(Debug, Deserialize)]
struct CrawlRecord {
    content: String,
    #[serde(default)]
    metadata: CrawlMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct CrawlMetadata {
    #[serde(rename = "sourceURL", default)]
    source_url: Option<String>,
}

#[async_trait]
impl Retriever for CommandRetriever {
    async fn search(&self, query: &str) -> Result<Vec<ContentItem>, RetrievalError> {
        debug!(program = %self.program, query, "running crawler");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(query)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RetrievalError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RetrievalError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let records: Vec<CrawlRecord> = serde_json::from_slice(&output.stdout)
            .map_err(|e| RetrievalError::Parse(e.to_string()))?;

        Ok(records
            .into_iter()
            .map(|r| ContentItem::new(r.content, r.metadata.source_url.unwrap_or_default()))
            .collect())
    }
}
