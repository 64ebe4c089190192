use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::research::ResearchResult;

/// A completed research run, as persisted by storage.
///
/// The rendered report lives next to the run metadata as its own markdown
/// file, so it is not part of the serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRun {
    /// Unique identifier for this run
    pub id: String,
    /// The topic as researched (including any clarifying answers)
    pub query: String,
    pub breadth: usize,
    pub depth: usize,
    pub created_at: DateTime<Utc>,
    pub learnings: Vec<String>,
    #[serde(rename = "visitedUrls")]
    pub visited_urls: Vec<String>,
    /// Rendered report or answer
    #[serde(skip)]
    pub report: Option<String>,
}

impl ResearchRun {
    /// Creates a run record from a finished research result.
    pub fn new(query: impl Into<String>, breadth: usize, depth: usize, result: ResearchResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            breadth,
            depth,
            created_at: Utc::now(),
            learnings: result.learnings,
            visited_urls: result.visited_urls,
            report: None,
        }
    }

    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    /// First line of the query, shortened for listings.
    pub fn title(&self) -> String {
        let first_line = self.query.lines().next().unwrap_or_default().trim();
        let first_line = first_line
            .strip_prefix("Initial Query:")
            .map(str::trim)
            .unwrap_or(first_line);
        if first_line.chars().count() > 60 {
            let short: String = first_line.chars().take(57).collect();
            format!("{short}...")
        } else {
            first_line.to_string()
        }
    }

    /// Converts the run to a summary (for listings).
    pub fn to_summary(&self) -> RunSummary {
        RunSummary {
            id: self.id.clone(),
            title: self.title(),
            learnings: self.learnings.len(),
            sources: self.visited_urls.len(),
            created_at: self.created_at,
        }
    }
}

/// A lightweight summary of a run for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub title: String,
    pub learnings: usize,
    pub sources: usize,
    pub created_at: DateTime<Utc>,
}
