use crate::research::ResearchQuery;

/// Receives progress events from a research run.
///
/// `depth` is the remaining depth of the level the event belongs to. Events
/// from sibling branches interleave.
pub trait ProgressReporter: Send + Sync {
    /// Called after a level's queries are planned.
    fn queries_planned(&self, depth: usize, queries: &[ResearchQuery]);
    /// Called when a branch is admitted and starts retrieving.
    fn query_started(&self, depth: usize, query: &str);
    /// Called when a branch has synthesized its learnings.
    fn query_completed(&self, depth: usize, query: &str, learnings: usize);
    /// Called when a branch fails and its results are dropped.
    fn query_failed(&self, depth: usize, query: &str, error: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn queries_planned(&self, _depth: usize, _queries: &[ResearchQuery]) {}
    fn query_started(&self, _depth: usize, _query: &str) {}
    fn query_completed(&self, _depth: usize, _query: &str, _learnings: usize) {}
    fn query_failed(&self, _depth: usize, _query: &str, _error: &str) {}
}
