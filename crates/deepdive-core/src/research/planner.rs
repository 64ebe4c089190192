use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::generate::{generate_object, GenerationError, GenerationRequest, StructuredGenerator};
use crate::research::prompts::{plan_prompt, plan_schema, system_prompt};

/// Goal attached to queries the model returned without one.
pub const DEFAULT_RESEARCH_GOAL: &str =
    "Research this query and collect the most relevant, specific findings about the topic.";

/// A search query and what it is meant to find out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchQuery {
    pub query: String,
    #[serde(rename = "researchGoal")]
    pub research_goal: String,
}

impl ResearchQuery {
    pub fn new(query: impl Into<String>, research_goal: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            research_goal: research_goal.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    queries: Vec<PlannedQuery>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlannedQuery {
    Bare(String),
    Detailed {
        query: String,
        #[serde(rename = "researchGoal", default)]
        research_goal: Option<String>,
    },
}

impl From<PlannedQuery> for ResearchQuery {
    fn from(planned: PlannedQuery) -> Self {
        match planned {
            PlannedQuery::Bare(query) => ResearchQuery::new(query, DEFAULT_RESEARCH_GOAL),
            PlannedQuery::Detailed {
                query,
                research_goal,
            } => {
                let goal = research_goal
                    .filter(|g| !g.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_RESEARCH_GOAL.to_string());
                ResearchQuery::new(query, goal)
            }
        }
    }
}

/// Turns a topic into a bounded list of search queries.
#[derive(Clone)]
pub struct QueryPlanner {
    generator: Arc<dyn StructuredGenerator>,
}

impl QueryPlanner {
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }

    /// Plans at most `max_queries` queries for `topic`.
    ///
    /// Prior learnings steer the model toward more specific follow-ups.
    /// Generation failures are returned as-is.
    pub async fn plan(
        &self,
        topic: &str,
        prior_learnings: &[String],
        max_queries: usize,
    ) -> Result<Vec<ResearchQuery>, GenerationError> {
        if max_queries == 0 {
            return Ok(Vec::new());
        }

        let request = GenerationRequest::new(
            system_prompt(),
            plan_prompt(topic, prior_learnings, max_queries),
            plan_schema(max_queries),
        );
        let response: PlanResponse = generate_object(self.generator.as_ref(), &request).await?;

        let queries: Vec<ResearchQuery> = response
            .queries
            .into_iter()
            .map(ResearchQuery::from)
            .filter(|q| !q.query.trim().is_empty())
            .take(max_queries)
            .collect();

        debug!(count = queries.len(), max_queries, "planned queries");
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Canned {
        response: Value,
        calls: Mutex<usize>,
    }

    impl Canned {
        fn new(response: Value) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl StructuredGenerator for Canned {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Value, GenerationError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_bare_strings_get_default_goal() {
        let generator = Canned::new(json!({
            "queries": [
                "rust async runtimes",
                { "query": "tokio vs smol", "researchGoal": "Compare schedulers" },
                { "query": "no goal given" }
            ]
        }));
        let planner = QueryPlanner::new(generator);

        let queries = planner.plan("rust", &[], 5).await.unwrap();
        assert_eq!(
            queries,
            vec![
                ResearchQuery::new("rust async runtimes", DEFAULT_RESEARCH_GOAL),
                ResearchQuery::new("tokio vs smol", "Compare schedulers"),
                ResearchQuery::new("no goal given", DEFAULT_RESEARCH_GOAL),
            ]
        );
    }

    #[tokio::test]
    async fn test_truncates_to_max_queries() {
        let generator = Canned::new(json!({ "queries": ["a", "b", "c", "d"] }));
        let planner = QueryPlanner::new(generator);
        let queries = planner.plan("topic", &[], 2).await.unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].query, "b");
    }

    #[tokio::test]
    async fn test_zero_budget_skips_generation() {
        let generator = Canned::new(json!({ "queries": ["a"] }));
        let planner = QueryPlanner::new(generator.clone());
        assert!(planner.plan("topic", &[], 0).await.unwrap().is_empty());
        assert_eq!(*generator.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_response_is_error() {
        let generator = Canned::new(json!({ "queries": "not a list" }));
        let planner = QueryPlanner::new(generator);
        assert!(matches!(
            planner.plan("topic", &[], 2).await,
            Err(GenerationError::Schema(_))
        ));
    }
}
