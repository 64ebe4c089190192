use serde::Deserialize;

use crate::generate::{generate_object, GenerationError, GenerationRequest, StructuredGenerator};
use crate::research::prompts::{feedback_prompt, feedback_schema, system_prompt};

#[derive(Debug, Deserialize)]
struct FeedbackResponse {
    #[serde(default)]
    questions: Vec<String>,
}

/// Asks the model for up to `max_questions` questions that clarify what the
/// user wants researched.
pub async fn clarifying_questions(
    generator: &dyn StructuredGenerator,
    query: &str,
    max_questions: usize,
) -> Result<Vec<String>, GenerationError> {
    if max_questions == 0 {
        return Ok(Vec::new());
    }

    let request = GenerationRequest::new(
        system_prompt(),
        feedback_prompt(query, max_questions),
        feedback_schema(max_questions),
    );
    let response: FeedbackResponse = generate_object(generator, &request).await?;

    Ok(response
        .questions
        .into_iter()
        .filter(|q| !q.trim().is_empty())
        .take(max_questions)
        .collect())
}

/// Folds the user's answers to clarifying questions into the research topic.
pub fn combine_query(initial_query: &str, answers: &[(String, String)]) -> String {
    if answers.is_empty() {
        return initial_query.to_string();
    }

    let qa = answers
        .iter()
        .map(|(question, answer)| format!("Q: {question}\nA: {answer}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Initial Query: {initial_query}\nFollow-up Questions and Answers:\n{qa}")
}
