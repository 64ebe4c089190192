//! Prompt text and response schemas for the research pipeline.

use chrono::Utc;
use serde_json::{json, Value};

/// System prompt shared by every research call. Names today's date so the
/// model can reason about recency.
pub fn system_prompt() -> String {
    let today = Utc::now().format("%Y-%m-%d");
    format!(
        r#"You are an expert researcher. Today is {today}. Follow these instructions when responding:
- You may be asked about subjects after your knowledge cutoff. Assume the user is right when presented with news.
- The user is a highly experienced analyst. Do not simplify; be detailed and correct.
- Be highly organized and precise.
- Suggest solutions and angles the user did not think about.
- Prefer strong arguments over authorities; the source alone does not make a claim true.
- Consider new technologies and contrarian ideas, not only conventional wisdom.
- Speculation is allowed when clearly flagged as such."#
    )
}

/// Builds the prompt asking for search queries on a topic.
pub fn plan_prompt(topic: &str, prior_learnings: &[String], max_queries: usize) -> String {
    let mut prompt = format!(
        "Given the following prompt from the user, generate a list of search engine queries to \
         research the topic. Return at most {max_queries} queries, fewer if the prompt is already \
         narrow. Every query must be unique and must not overlap with the others.\n\n\
         <prompt>{topic}</prompt>"
    );

    if !prior_learnings.is_empty() {
        prompt.push_str(
            "\n\nHere are the learnings from previous research. Use them to write more specific queries:\n",
        );
        prompt.push_str(&prior_learnings.join("\n"));
    }

    prompt
}

/// Schema for the planner response. Items may be bare strings or objects.
pub fn plan_schema(max_queries: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "queries": {
                "type": "array",
                "maxItems": max_queries,
                "description": format!("List of search queries, max of {max_queries}"),
                "items": {
                    "anyOf": [
                        { "type": "string" },
                        {
                            "type": "object",
                            "properties": {
                                "query": { "type": "string", "description": "The search query" },
                                "researchGoal": {
                                    "type": "string",
                                    "description": "The goal this query serves and how to advance the research once results are in. Be as specific as possible."
                                }
                            },
                            "required": ["query"]
                        }
                    ]
                }
            }
        },
        "required": ["queries"]
    })
}

/// Builds the prompt extracting learnings from retrieved contents.
pub fn synthesis_prompt(
    query: &str,
    contents: &[String],
    max_learnings: usize,
    max_follow_ups: usize,
) -> String {
    let contents = contents
        .iter()
        .map(|content| format!("<content>\n{content}\n</content>"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given the following contents from a search for the query <query>{query}</query>, \
         generate a list of learnings from the contents. Return at most {max_learnings} learnings, \
         fewer if the contents are thin. Each learning must be unique and concise while staying as \
         information-dense as possible. Include entities such as people, places, companies, products \
         and things, as well as exact metrics, numbers and dates. Also return at most \
         {max_follow_ups} follow-up questions that would take the research further.\n\n\
         <contents>{contents}</contents>"
    )
}

/// Schema for the synthesizer response.
pub fn synthesis_schema(max_learnings: usize, max_follow_ups: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "learnings": {
                "type": "array",
                "maxItems": max_learnings,
                "items": { "type": "string" },
                "description": format!("List of learnings, max of {max_learnings}")
            },
            "followUpQuestions": {
                "type": "array",
                "maxItems": max_follow_ups,
                "items": { "type": "string" },
                "description": format!("List of follow-up questions to research the topic further, max of {max_follow_ups}")
            }
        },
        "required": ["learnings"]
    })
}

/// Topic handed to a recursive call: the branch's goal plus its follow-ups.
pub fn next_topic(research_goal: &str, follow_up_questions: &[String]) -> String {
    let directions: String = follow_up_questions
        .iter()
        .map(|q| format!("\n{q}"))
        .collect();
    format!("Previous research goal: {research_goal}\nFollow-up research directions: {directions}")
        .trim()
        .to_string()
}

/// Builds the prompt asking for clarifying questions.
pub fn feedback_prompt(query: &str, max_questions: usize) -> String {
    format!(
        "Given the following query from the user, ask follow-up questions that clarify the \
         research direction. Return at most {max_questions} questions, fewer if the query is \
         already clear.\n\n<query>{query}</query>"
    )
}

pub fn feedback_schema(max_questions: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "maxItems": max_questions,
                "items": { "type": "string" },
                "description": format!("Follow-up questions to clarify the research direction, max of {max_questions}")
            }
        },
        "required": ["questions"]
    })
}

/// Wraps learnings in tags for the report and answer prompts.
pub fn learnings_block(learnings: &[String]) -> String {
    learnings
        .iter()
        .map(|l| format!("<learning>\n{l}\n</learning>"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn report_prompt(topic: &str, learnings_block: &str) -> String {
    format!(
        "Given the following prompt from the user, write a final report on the topic using the \
         learnings from research. Make it as detailed as possible, aim for three or more pages, \
         and include all of the learnings.\n\n<prompt>{topic}</prompt>\n\n\
         Here are all the learnings from research:\n\n<learnings>\n{learnings_block}\n</learnings>"
    )
}

pub fn report_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "reportMarkdown": {
                "type": "string",
                "description": "Final report on the topic in Markdown"
            }
        },
        "required": ["reportMarkdown"]
    })
}

pub fn answer_prompt(topic: &str, learnings_block: &str) -> String {
    format!(
        "Given the following prompt from the user, write a final answer on the topic using the \
         learnings from research. Follow the format the prompt asks for. Keep it as concise as \
         possible, usually a few words or one sentence.\n\n<prompt>{topic}</prompt>\n\n\
         Here are all the learnings from research:\n\n<learnings>\n{learnings_block}\n</learnings>"
    )
}

pub fn answer_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "exactAnswer": {
                "type": "string",
                "description": "The final answer, short and concise"
            }
        },
        "required": ["exactAnswer"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_topic() {
        let topic = next_topic(
            "Understand adoption",
            &["Who uses it?".to_string(), "Since when?".to_string()],
        );
        assert_eq!(
            topic,
            "Previous research goal: Understand adoption\nFollow-up research directions: \nWho uses it?\nSince when?"
        );
    }

    #[test]
    fn test_next_topic_without_follow_ups() {
        assert_eq!(
            next_topic("Goal", &[]),
            "Previous research goal: Goal\nFollow-up research directions:"
        );
    }

    #[test]
    fn test_plan_prompt_includes_learnings_only_when_present() {
        assert!(!plan_prompt("rust", &[], 3).contains("previous research"));
        let prompt = plan_prompt("rust", &["Rust 1.0 shipped in 2015".to_string()], 3);
        assert!(prompt.contains("Rust 1.0 shipped in 2015"));
    }

    #[test]
    fn test_plan_schema_bounds_queries() {
        assert_eq!(plan_schema(4)["properties"]["queries"]["maxItems"], 4);
    }

    #[test]
    fn test_system_prompt_has_date() {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert!(system_prompt().contains(&today));
    }
}
