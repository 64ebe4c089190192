use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::budget::TextBudgeter;
use crate::config::DEFAULT_CONTEXT_TOKEN_LIMIT;
use crate::generate::{generate_object, GenerationError, GenerationRequest, StructuredGenerator};
use crate::research::prompts::{
    answer_prompt, answer_schema, learnings_block, report_prompt, report_schema, system_prompt,
};
use crate::research::ResearchResult;

#[derive(Debug, Deserialize)]
struct ReportResponse {
    #[serde(rename = "reportMarkdown")]
    report_markdown: String,
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    #[serde(rename = "exactAnswer")]
    exact_answer: String,
}

/// Renders research results as a markdown report or a short answer.
///
/// Composition never fails: if the model call fails or returns nothing, the
/// learnings are listed as-is.
#[derive(Clone)]
pub struct ReportComposer {
    generator: Arc<dyn StructuredGenerator>,
    budgeter: TextBudgeter,
    context_token_limit: usize,
}

impl ReportComposer {
    pub fn new(generator: Arc<dyn StructuredGenerator>, budgeter: TextBudgeter) -> Self {
        Self {
            generator,
            budgeter,
            context_token_limit: DEFAULT_CONTEXT_TOKEN_LIMIT,
        }
    }

    /// Token ceiling for the learnings sent to the model.
    pub fn with_context_token_limit(mut self, limit: usize) -> Self {
        self.context_token_limit = limit;
        self
    }

    /// Writes a markdown report on `topic`, followed by a sources section.
    pub async fn compose_report(&self, topic: &str, result: &ResearchResult) -> String {
        let body = match self.generate_report(topic, result).await {
            Ok(markdown) if !markdown.trim().is_empty() => markdown,
            Ok(_) => {
                warn!("report generation returned no content, listing learnings instead");
                fallback_report(topic, &result.learnings)
            }
            Err(e) => {
                warn!(error = %e, "report generation failed, listing learnings instead");
                fallback_report(topic, &result.learnings)
            }
        };

        format!("{}\n\n{}", body.trim_end(), sources_section(&result.visited_urls))
    }

    /// Writes a short, direct answer to `topic`.
    ///
    /// Falls back to the first learning, or an empty string when there are none.
    pub async fn compose_answer(&self, topic: &str, result: &ResearchResult) -> String {
        let fallback = || result.learnings.first().cloned().unwrap_or_default();

        let request = GenerationRequest::new(
            system_prompt(),
            answer_prompt(topic, &self.learnings_context(result)),
            answer_schema(),
        );
        match generate_object::<AnswerResponse>(self.generator.as_ref(), &request).await {
            Ok(response) if !response.exact_answer.trim().is_empty() => response.exact_answer,
            Ok(_) => fallback(),
            Err(e) => {
                warn!(error = %e, "answer generation failed, using first learning");
                fallback()
            }
        }
    }

    async fn generate_report(
        &self,
        topic: &str,
        result: &ResearchResult,
    ) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(
            system_prompt(),
            report_prompt(topic, &self.learnings_context(result)),
            report_schema(),
        );
        let response: ReportResponse = generate_object(self.generator.as_ref(), &request).await?;
        Ok(response.report_markdown)
    }

    fn learnings_context(&self, result: &ResearchResult) -> String {
        self.budgeter
            .trim(&learnings_block(&result.learnings), self.context_token_limit)
    }
}

/// Bullet list of raw learnings.
pub fn fallback_report(topic: &str, learnings: &[String]) -> String {
    let mut md = format!("# Research Report: {topic}\n\n## Learnings\n\n");
    if learnings.is_empty() {
        md.push_str("No learnings were collected.\n");
    }
    for learning in learnings {
        md.push_str(&format!("- {learning}\n"));
    }
    md
}

/// Deduplicated list of visited sources.
pub fn sources_section(urls: &[String]) -> String {
    let mut seen = HashSet::new();
    let mut md = String::from("## Sources\n\n");
    let mut any = false;
    for url in urls.iter().filter(|url| seen.insert(url.as_str())) {
        md.push_str(&format!("- {url}\n"));
        any = true;
    }
    if !any {
        md.push_str("No sources were visited.\n");
    }
    md
}
