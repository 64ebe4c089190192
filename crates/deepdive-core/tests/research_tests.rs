use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use deepdive_core::budget::HeuristicCounter;
use deepdive_core::research::ResearchQuery;
use deepdive_core::{
    ContentItem, GenerationError, GenerationRequest, ProgressReporter, ReportComposer,
    ResearchConfig, ResearchError, ResearchRunner, RetrievalError, Retriever, StructuredGenerator,
    TextBudgeter,
};

type PlanFn = dyn Fn(usize, &str) -> Result<Vec<Value>, String> + Send + Sync;
type LearnFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// Structured generator that answers planner and synthesizer calls from
/// closures, routed by the requested schema.
struct ScriptedModel {
    plan: Box<PlanFn>,
    learn: Box<LearnFn>,
    slow_query: Option<(String, Duration)>,
    plan_calls: Mutex<Vec<(usize, String)>>,
    synth_calls: AtomicUsize,
}

impl ScriptedModel {
    /// Plans `max` uniquely numbered queries and learns one fact plus one
    /// follow-up per query.
    fn new() -> Self {
        let counter = AtomicUsize::new(0);
        Self {
            plan: Box::new(move |max: usize, _: &str| {
                Ok((0..max)
                    .map(|_| json!(format!("query {}", counter.fetch_add(1, SeqCst))))
                    .collect())
            }),
            learn: Box::new(|query: &str| {
                Ok(json!({
                    "learnings": [format!("learning from {query}")],
                    "followUpQuestions": [format!("follow-up to {query}")]
                }))
            }),
            slow_query: None,
            plan_calls: Mutex::new(Vec::new()),
            synth_calls: AtomicUsize::new(0),
        }
    }

    fn with_plan(
        mut self,
        plan: impl Fn(usize, &str) -> Result<Vec<Value>, String> + Send + Sync + 'static,
    ) -> Self {
        self.plan = Box::new(plan);
        self
    }

    fn with_learn(
        mut self,
        learn: impl Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.learn = Box::new(learn);
        self
    }

    fn with_slow_query(mut self, query: &str, delay: Duration) -> Self {
        self.slow_query = Some((query.to_string(), delay));
        self
    }

    fn plan_calls(&self) -> Vec<(usize, String)> {
        self.plan_calls.lock().unwrap().clone()
    }
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> &'a str {
    text.split(open)
        .nth(1)
        .and_then(|rest| rest.split(close).next())
        .unwrap_or_default()
}

#[async_trait]
impl StructuredGenerator for ScriptedModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let properties = &request.schema["properties"];

        if properties.get("queries").is_some() {
            let max = properties["queries"]["maxItems"].as_u64().unwrap_or(0) as usize;
            self.plan_calls
                .lock()
                .unwrap()
                .push((max, request.prompt.clone()));
            let queries = (self.plan)(max, &request.prompt).map_err(GenerationError::Schema)?;
            return Ok(json!({ "queries": queries }));
        }

        if properties.get("learnings").is_some() {
            let query = between(&request.prompt, "<query>", "</query>").to_string();
            self.synth_calls.fetch_add(1, SeqCst);
            if let Some((slow, delay)) = &self.slow_query {
                if *slow == query {
                    tokio::time::sleep(*delay).await;
                }
            }
            return (self.learn)(&query).map_err(GenerationError::Schema);
        }

        Err(GenerationError::Schema("unscripted request".to_string()))
    }
}

fn url_for(query: &str) -> String {
    format!("https://example.com/{}", query.replace(' ', "-"))
}

/// Retriever returning one item per query and tracking how many searches
/// overlap.
#[derive(Default)]
struct FakeRetriever {
    failing: Vec<String>,
    shared_url: Option<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeRetriever {
    fn failing_on(queries: &[&str]) -> Self {
        Self {
            failing: queries.iter().map(|q| q.to_string()).collect(),
            ..Self::default()
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn search(&self, query: &str) -> Result<Vec<ContentItem>, RetrievalError> {
        self.calls.fetch_add(1, SeqCst);
        let now = self.in_flight.fetch_add(1, SeqCst) + 1;
        self.peak.fetch_max(now, SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, SeqCst);

        if self.failing.iter().any(|f| f == query) {
            return Err(RetrievalError::Status(500));
        }
        let url = self.shared_url.clone().unwrap_or_else(|| url_for(query));
        Ok(vec![ContentItem::new(format!("Content about {query}"), url)])
    }
}

#[derive(Default)]
struct CountingProgress {
    planned: AtomicUsize,
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl ProgressReporter for CountingProgress {
    fn queries_planned(&self, _depth: usize, queries: &[ResearchQuery]) {
        self.planned.fetch_add(queries.len(), SeqCst);
    }
    fn query_started(&self, _depth: usize, _query: &str) {
        self.started.fetch_add(1, SeqCst);
    }
    fn query_completed(&self, _depth: usize, _query: &str, _learnings: usize) {
        self.completed.fetch_add(1, SeqCst);
    }
    fn query_failed(&self, _depth: usize, _query: &str, _error: &str) {
        self.failed.fetch_add(1, SeqCst);
    }
}

fn runner(
    model: &Arc<ScriptedModel>,
    retriever: &Arc<FakeRetriever>,
    config: ResearchConfig,
) -> ResearchRunner {
    ResearchRunner::new(
        model.clone(),
        retriever.clone(),
        TextBudgeter::with_counter(HeuristicCounter::new(4)),
        &config,
    )
}

fn fixed_plan(queries: &'static [&'static str]) -> impl Fn(usize, &str) -> Result<Vec<Value>, String> {
    move |_: usize, _: &str| Ok(queries.iter().map(|q| json!(q)).collect())
}

fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}

#[tokio::test]
async fn test_two_queries_two_learnings_each() {
    let model = Arc::new(
        ScriptedModel::new()
            .with_plan(fixed_plan(&["topic X one", "topic X two"]))
            .with_learn(|query| {
                Ok(json!({
                    "learnings": [format!("{query} fact 1"), format!("{query} fact 2")],
                    "followUpQuestions": []
                }))
            }),
    );
    let retriever = Arc::new(FakeRetriever::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic X", 2, 1)
        .await
        .unwrap();

    assert_eq!(
        sorted(result.learnings),
        vec![
            "topic X one fact 1",
            "topic X one fact 2",
            "topic X two fact 1",
            "topic X two fact 2"
        ]
    );
    assert_eq!(
        sorted(result.visited_urls),
        vec![url_for("topic X one"), url_for("topic X two")]
    );
    assert_eq!(model.plan_calls().len(), 1);
}

#[tokio::test]
async fn test_results_hold_no_duplicates() {
    let model = Arc::new(
        ScriptedModel::new()
            .with_plan(fixed_plan(&["a", "b", "c"]))
            .with_learn(|query| {
                Ok(json!({
                    "learnings": ["shared fact", format!("{query} fact")],
                    "followUpQuestions": []
                }))
            }),
    );
    let retriever = Arc::new(FakeRetriever {
        shared_url: Some("https://shared.example".to_string()),
        ..FakeRetriever::default()
    });

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 3, 1)
        .await
        .unwrap();

    assert_eq!(result.learnings.len(), 4);
    assert_eq!(
        result.learnings.iter().filter(|l| *l == "shared fact").count(),
        1
    );
    assert_eq!(result.visited_urls, vec!["https://shared.example"]);
}

#[tokio::test]
async fn test_retrieval_failure_keeps_other_branches() {
    let model = Arc::new(ScriptedModel::new().with_plan(fixed_plan(&["alpha", "beta", "gamma"])));
    let retriever = Arc::new(FakeRetriever::failing_on(&["beta"]));

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 3, 1)
        .await
        .unwrap();

    assert!(result.learnings.contains(&"learning from alpha".to_string()));
    assert!(result.learnings.contains(&"learning from gamma".to_string()));
    assert_eq!(
        sorted(result.visited_urls),
        vec![url_for("alpha"), url_for("gamma")]
    );
    // The failed search still reaches synthesis, with no contents.
    assert_eq!(model.synth_calls.load(SeqCst), 3);
}

#[tokio::test]
async fn test_synthesis_failure_drops_only_that_branch() {
    let model = Arc::new(
        ScriptedModel::new()
            .with_plan(fixed_plan(&["good", "bad"]))
            .with_learn(|query| {
                if query == "bad" {
                    Err("malformed response".to_string())
                } else {
                    Ok(json!({ "learnings": [format!("learning from {query}")] }))
                }
            }),
    );
    let retriever = Arc::new(FakeRetriever::default());
    let progress = Arc::new(CountingProgress::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .with_progress(progress.clone())
        .research("topic", 2, 1)
        .await
        .unwrap();

    assert_eq!(result.learnings, vec!["learning from good"]);
    assert_eq!(result.visited_urls, vec![url_for("good")]);
    assert_eq!(progress.planned.load(SeqCst), 2);
    assert_eq!(progress.started.load(SeqCst), 2);
    assert_eq!(progress.completed.load(SeqCst), 1);
    assert_eq!(progress.failed.load(SeqCst), 1);
}

#[tokio::test]
async fn test_depth_zero_does_not_recurse() {
    let model = Arc::new(ScriptedModel::new());
    let retriever = Arc::new(FakeRetriever::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 2, 0)
        .await
        .unwrap();

    assert_eq!(model.plan_calls().len(), 1);
    assert_eq!(result.learnings.len(), 2);
}

#[tokio::test]
async fn test_zero_queries_gives_empty_result() {
    let model = Arc::new(ScriptedModel::new().with_plan(|_, _| Ok(Vec::new())));
    let retriever = Arc::new(FakeRetriever::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 3, 2)
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(model.synth_calls.load(SeqCst), 0);
    assert_eq!(retriever.calls.load(SeqCst), 0);
}

#[tokio::test]
async fn test_top_level_planning_failure_is_an_error() {
    let model = Arc::new(ScriptedModel::new().with_plan(|_, _| Err("model offline".to_string())));
    let retriever = Arc::new(FakeRetriever::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 2, 2)
        .await;

    assert!(matches!(result, Err(ResearchError::Planning(_))));
}

#[tokio::test]
async fn test_child_planning_failure_drops_only_that_branch() {
    let model = Arc::new(ScriptedModel::new().with_plan(|_, prompt| {
        if prompt.contains("Previous research goal") {
            Err("child planning failed".to_string())
        } else {
            Ok(vec![json!("first"), json!("second")])
        }
    }));
    let retriever = Arc::new(FakeRetriever::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 2, 2)
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(model.plan_calls().len(), 3);
}

#[tokio::test]
async fn test_recursion_halves_breadth_and_carries_learnings() {
    let model = Arc::new(ScriptedModel::new());
    let retriever = Arc::new(FakeRetriever::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 4, 2)
        .await
        .unwrap();

    let calls = model.plan_calls();
    let mut maxes: Vec<usize> = calls.iter().map(|(max, _)| *max).collect();
    maxes.sort();
    assert_eq!(maxes, vec![2, 2, 2, 2, 4]);

    for (_, prompt) in calls.iter().filter(|(max, _)| *max == 2) {
        assert!(prompt.contains("Previous research goal:"));
        assert!(prompt.contains("Follow-up research directions:"));
        assert!(prompt.contains("learning from query"));
    }

    // Four top-level branches plus two children each.
    assert_eq!(result.learnings.len(), 12);
    assert_eq!(result.visited_urls.len(), 12);
}

#[tokio::test]
async fn test_child_topic_uses_research_goal() {
    let model = Arc::new(ScriptedModel::new().with_plan(|max, prompt| {
        if prompt.contains("Previous research goal") {
            Ok(Vec::new())
        } else {
            Ok(vec![json!({ "query": "lithium supply", "researchGoal": "Map lithium refiners" })]
                .into_iter()
                .take(max)
                .collect())
        }
    }));
    let retriever = Arc::new(FakeRetriever::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("batteries", 2, 2)
        .await
        .unwrap();

    let calls = model.plan_calls();
    assert_eq!(calls.len(), 2);
    let child_prompt = &calls[1].1;
    assert!(child_prompt.contains("Previous research goal: Map lithium refiners"));
    assert!(child_prompt.contains("follow-up to lithium supply"));

    // The child planned nothing, so the branch keeps what it learned.
    assert_eq!(result.learnings, vec!["learning from lithium supply"]);
    assert_eq!(result.visited_urls, vec![url_for("lithium supply")]);
}

#[tokio::test]
async fn test_research_terminates_with_bounded_plan_calls() {
    let model = Arc::new(ScriptedModel::new());
    let retriever = Arc::new(FakeRetriever::default());

    runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 3, 3)
        .await
        .unwrap();

    // 1 call at breadth 3, 3 at breadth 2, 6 at breadth 1.
    assert_eq!(model.plan_calls().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_is_global() {
    let model = Arc::new(ScriptedModel::new());
    let retriever = Arc::new(FakeRetriever::with_delay(Duration::from_millis(50)));
    let config = ResearchConfig {
        concurrency_limit: 2,
        ..ResearchConfig::default()
    };

    runner(&model, &retriever, config)
        .research("topic", 4, 2)
        .await
        .unwrap();

    assert_eq!(retriever.calls.load(SeqCst), 12);
    assert!(retriever.peak.load(SeqCst) <= 2);
}

#[tokio::test(start_paused = true)]
async fn test_single_permit_does_not_deadlock_recursion() {
    let model = Arc::new(ScriptedModel::new());
    let retriever = Arc::new(FakeRetriever::with_delay(Duration::from_millis(50)));
    let config = ResearchConfig {
        concurrency_limit: 1,
        ..ResearchConfig::default()
    };

    let result = tokio::time::timeout(
        Duration::from_secs(60),
        runner(&model, &retriever, config).research("topic", 2, 3),
    )
    .await
    .expect("research should not deadlock")
    .unwrap();

    assert_eq!(retriever.peak.load(SeqCst), 1);
    assert!(!result.learnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_synthesis_timeout_fails_branch() {
    let model = Arc::new(
        ScriptedModel::new()
            .with_plan(fixed_plan(&["fast", "slow"]))
            .with_slow_query("slow", Duration::from_secs(5)),
    );
    let retriever = Arc::new(FakeRetriever::default());
    let progress = Arc::new(CountingProgress::default());
    let config = ResearchConfig {
        synthesis_timeout_secs: 1,
        ..ResearchConfig::default()
    };

    let result = runner(&model, &retriever, config)
        .with_progress(progress.clone())
        .research("topic", 2, 1)
        .await
        .unwrap();

    assert_eq!(result.learnings, vec!["learning from fast"]);
    assert_eq!(progress.failed.load(SeqCst), 1);
}

#[tokio::test]
async fn test_report_falls_back_to_learnings_and_sources() {
    let model = Arc::new(ScriptedModel::new().with_plan(fixed_plan(&["alpha", "beta"])));
    let retriever = Arc::new(FakeRetriever::default());

    let result = runner(&model, &retriever, ResearchConfig::default())
        .research("topic", 2, 1)
        .await
        .unwrap();

    // The scripted model refuses report requests.
    let composer = ReportComposer::new(
        model.clone(),
        TextBudgeter::with_counter(HeuristicCounter::new(4)),
    );
    let report = composer.compose_report("topic", &result).await;

    assert!(report.contains("# Research Report: topic"));
    assert!(report.contains("- learning from alpha"));
    assert!(report.contains("- learning from beta"));
    assert!(report.contains("## Sources"));
    assert!(report.contains(&url_for("alpha")));
}
