use std::time::Duration;

use deepdive_core::{ProgressReporter, ResearchQuery};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over every query planned so far. The total grows as deeper
/// levels plan their queries.
pub(crate) struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}") {
            bar.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]),
            );
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.set_message("Planning queries");
        Self { bar }
    }

    /// Clears the bar, e.g. before printing results.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn queries_planned(&self, depth: usize, queries: &[ResearchQuery]) {
        self.bar.inc_length(queries.len() as u64);
        self.bar
            .set_message(format!("Planned {} queries (depth {depth})", queries.len()));
    }

    fn query_started(&self, depth: usize, query: &str) {
        self.bar.set_message(format!("[depth {depth}] {query}"));
    }

    fn query_completed(&self, _depth: usize, query: &str, learnings: usize) {
        self.bar.inc(1);
        self.bar
            .println(format!("  ✓ {query} ({learnings} learnings)"));
    }

    fn query_failed(&self, _depth: usize, query: &str, error: &str) {
        self.bar.inc(1);
        self.bar.println(format!("  ✗ {query}: {error}"));
    }
}
