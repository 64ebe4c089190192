use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::budget::TextBudgeter;
use crate::config::ResearchConfig;
use crate::generate::{GenerationError, StructuredGenerator};
use crate::research::progress::{ProgressReporter, SilentProgress};
use crate::research::prompts::next_topic;
use crate::research::{QueryPlanner, ResearchQuery, ResearchResult, ResultSynthesizer};
use crate::retrieve::{ContentRetriever, Retriever};

/// Breadth handed to the next level: half, rounded up.
pub fn child_breadth(breadth: usize) -> usize {
    breadth.div_ceil(2)
}

/// Runs recursive, breadth/depth-bounded research.
///
/// Each level plans up to `breadth` queries and explores them as branches.
/// A branch retrieves content, synthesizes learnings and, while depth
/// remains, recurses on its follow-up questions with half the breadth. One
/// semaphore admits branches for the whole tree; a branch holds its permit
/// while retrieving and synthesizing and releases it before recursing, so
/// children never wait on their own ancestors.
pub struct ResearchRunner {
    planner: QueryPlanner,
    synthesizer: ResultSynthesizer,
    retriever: ContentRetriever,
    limiter: Arc<Semaphore>,
    max_learnings: usize,
    progress: Arc<dyn ProgressReporter>,
}

impl ResearchRunner {
    /// Creates a new research runner.
    pub fn new(
        generator: Arc<dyn StructuredGenerator>,
        retriever: Arc<dyn Retriever>,
        budgeter: TextBudgeter,
        config: &ResearchConfig,
    ) -> Self {
        let synthesizer = ResultSynthesizer::new(generator.clone(), budgeter)
            .with_item_token_limit(config.item_token_limit)
            .with_timeout(config.synthesis_timeout());

        Self {
            planner: QueryPlanner::new(generator),
            synthesizer,
            retriever: ContentRetriever::new(retriever),
            limiter: Arc::new(Semaphore::new(config.concurrency_limit.max(1))),
            max_learnings: config.max_learnings,
            progress: Arc::new(SilentProgress),
        }
    }

    /// Sets the progress reporter.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Researches `topic` from scratch.
    ///
    /// Only a failure to plan the top-level queries is returned as an error;
    /// failed branches contribute nothing and the run carries on.
    pub async fn research(
        &self,
        topic: &str,
        breadth: usize,
        depth: usize,
    ) -> Result<ResearchResult, ResearchError> {
        info!(breadth, depth, "starting research");
        let result = self
            .research_with(topic.to_string(), breadth, depth, Vec::new(), Vec::new())
            .await?;
        info!(
            learnings = result.learnings.len(),
            sources = result.visited_urls.len(),
            "research complete"
        );
        Ok(result)
    }

    /// Researches `topic` on top of learnings and sources already gathered.
    ///
    /// The result includes `prior_learnings` and `prior_urls` unless every
    /// branch failed.
    pub fn research_with<'a>(
        &'a self,
        topic: String,
        breadth: usize,
        depth: usize,
        prior_learnings: Vec<String>,
        prior_urls: Vec<String>,
    ) -> BoxFuture<'a, Result<ResearchResult, ResearchError>> {
        async move {
            let queries = self
                .planner
                .plan(&topic, &prior_learnings, breadth)
                .await
                .map_err(ResearchError::Planning)?;
            self.progress.queries_planned(depth, &queries);

            if queries.is_empty() {
                debug!(depth, "no queries planned, level ends here");
                return Ok(ResearchResult::new(prior_learnings, prior_urls));
            }

            let branches = queries.into_iter().map(|query| {
                self.run_branch(query, breadth, depth, &prior_learnings, &prior_urls)
            });
            let results = join_all(branches).await;

            Ok(ResearchResult::union(results))
        }
        .boxed()
    }

    /// Runs one branch. Any failure yields an empty result for this branch only.
    async fn run_branch(
        &self,
        query: ResearchQuery,
        breadth: usize,
        depth: usize,
        prior_learnings: &[String],
        prior_urls: &[String],
    ) -> ResearchResult {
        match self
            .explore(&query, breadth, depth, prior_learnings, prior_urls)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(query = %query.query, depth, error = %e, "branch failed, dropping its results");
                self.progress.query_failed(depth, &query.query, &e.to_string());
                ResearchResult::default()
            }
        }
    }

    async fn explore(
        &self,
        query: &ResearchQuery,
        breadth: usize,
        depth: usize,
        prior_learnings: &[String],
        prior_urls: &[String],
    ) -> Result<ResearchResult, ResearchError> {
        let next_breadth = child_breadth(breadth);
        let next_depth = depth.saturating_sub(1);

        let (synthesis, urls) = {
            let _permit = self
                .limiter
                .acquire()
                .await
                .map_err(|_| ResearchError::LimiterClosed)?;
            self.progress.query_started(depth, &query.query);

            let items = self.retriever.retrieve(&query.query).await;
            let urls: Vec<String> = items
                .iter()
                .map(|item| item.source_url.clone())
                .filter(|url| !url.is_empty())
                .collect();

            let synthesis = self
                .synthesizer
                .synthesize(&query.query, &items, self.max_learnings, next_breadth)
                .await
                .map_err(ResearchError::Synthesis)?;
            (synthesis, urls)
        };

        self.progress
            .query_completed(depth, &query.query, synthesis.learnings.len());

        let learnings: Vec<String> = prior_learnings
            .iter()
            .cloned()
            .chain(synthesis.learnings)
            .collect();
        let visited_urls: Vec<String> = prior_urls.iter().cloned().chain(urls).collect();

        if next_depth > 0 {
            debug!(
                query = %query.query,
                breadth = next_breadth,
                depth = next_depth,
                "researching deeper"
            );
            let topic = next_topic(&query.research_goal, &synthesis.follow_up_questions);
            self.research_with(topic, next_breadth, next_depth, learnings, visited_urls)
                .await
        } else {
            Ok(ResearchResult::new(learnings, visited_urls))
        }
    }
}

/// Errors that can occur during research.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Query planning failed: {0}")]
    Planning(#[source] GenerationError),

    #[error("Synthesis failed: {0}")]
    Synthesis(#[source] GenerationError),

    #[error("Concurrency limiter closed")]
    LimiterClosed,
}
