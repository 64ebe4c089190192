use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Learnings and visited sources accumulated by a research run.
///
/// Both lists hold no duplicates; entries keep first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub learnings: Vec<String>,
    #[serde(rename = "visitedUrls")]
    pub visited_urls: Vec<String>,
}

impl ResearchResult {
    pub fn new(
        learnings: impl IntoIterator<Item = String>,
        visited_urls: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            learnings: dedup(learnings),
            visited_urls: dedup(visited_urls),
        }
    }

    /// Set union of several results.
    pub fn union(results: impl IntoIterator<Item = ResearchResult>) -> Self {
        let (learnings, urls): (Vec<_>, Vec<_>) = results
            .into_iter()
            .map(|r| (r.learnings, r.visited_urls))
            .unzip();
        Self::new(learnings.into_iter().flatten(), urls.into_iter().flatten())
    }

    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty() && self.visited_urls.is_empty()
    }
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
