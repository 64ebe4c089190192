use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::budget::TextBudgeter;
use crate::config::{DEFAULT_ITEM_TOKEN_LIMIT, DEFAULT_SYNTHESIS_TIMEOUT_SECS};
use crate::generate::{generate_object, GenerationError, GenerationRequest, StructuredGenerator};
use crate::research::prompts::{synthesis_prompt, synthesis_schema, system_prompt};
use crate::retrieve::ContentItem;

/// Learnings and follow-up questions extracted for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub learnings: Vec<String>,
    #[serde(rename = "followUpQuestions")]
    pub follow_up_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    learnings: Vec<String>,
    #[serde(rename = "followUpQuestions", default)]
    follow_up_questions: Option<Vec<String>>,
}

/// Turns retrieved content for a query into learnings.
#[derive(Clone)]
pub struct ResultSynthesizer {
    generator: Arc<dyn StructuredGenerator>,
    budgeter: TextBudgeter,
    item_token_limit: usize,
    timeout: Duration,
}

impl ResultSynthesizer {
    pub fn new(generator: Arc<dyn StructuredGenerator>, budgeter: TextBudgeter) -> Self {
        Self {
            generator,
            budgeter,
            item_token_limit: DEFAULT_ITEM_TOKEN_LIMIT,
            timeout: Duration::from_secs(DEFAULT_SYNTHESIS_TIMEOUT_SECS),
        }
    }

    /// Token ceiling applied to each item before it is sent.
    pub fn with_item_token_limit(mut self, limit: usize) -> Self {
        self.item_token_limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extracts at most `max_learnings` learnings and `max_follow_ups`
    /// follow-up questions from `items`.
    ///
    /// Timeouts and generation failures are returned to the caller.
    pub async fn synthesize(
        &self,
        query: &str,
        items: &[ContentItem],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> Result<SynthesisResult, GenerationError> {
        let contents: Vec<String> = items
            .iter()
            .map(|item| self.budgeter.trim(&item.content, self.item_token_limit))
            .collect();

        let request = GenerationRequest::new(
            system_prompt(),
            synthesis_prompt(query, &contents, max_learnings, max_follow_ups),
            synthesis_schema(max_learnings, max_follow_ups),
        )
        .with_timeout(self.timeout);

        let response: SynthesisResponse = generate_object(self.generator.as_ref(), &request).await?;

        let result = SynthesisResult {
            learnings: response.learnings.into_iter().take(max_learnings).collect(),
            follow_up_questions: response
                .follow_up_questions
                .unwrap_or_default()
                .into_iter()
                .take(max_follow_ups)
                .collect(),
        };

        debug!(
            query,
            items = items.len(),
            learnings = result.learnings.len(),
            follow_ups = result.follow_up_questions.len(),
            "synthesized results"
        );
        Ok(result)
    }
}
