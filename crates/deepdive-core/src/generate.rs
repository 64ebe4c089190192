//! Structured generation: prompt + expected JSON shape in, typed object out.
//!
//! The research pipeline never talks to an [`LLM`] directly. Planner,
//! synthesizer and composer go through [`StructuredGenerator`], which lets
//! tests swap the model for a scripted fake.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::llm::{CompletionRequest, LLMError, LLM};

/// Errors from a structured generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM error: {0}")]
    LLM(#[from] LLMError),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response does not match the expected schema: {0}")]
    Schema(String),
}

/// One structured generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// JSON Schema the response must satisfy.
    pub schema: Value,
    /// Upper bound on the call's wall-clock time.
    pub timeout: Option<Duration>,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            schema,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Capability to produce a JSON object for a request.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Returns a JSON value for the request, or fails.
    ///
    /// Implementations need not apply `request.timeout`; [`generate_object`] does.
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}

/// Runs a generation call and deserializes the result into `T`.
///
/// The request timeout is enforced here, so it applies to every generator.
/// A value that does not deserialize into `T` is a [`GenerationError::Schema`].
pub async fn generate_object<T: DeserializeOwned>(
    generator: &dyn StructuredGenerator,
    request: &GenerationRequest,
) -> Result<T, GenerationError> {
    let value = match request.timeout {
        Some(limit) => tokio::time::timeout(limit, generator.generate(request))
            .await
            .map_err(|_| GenerationError::Timeout(limit))??,
        None => generator.generate(request).await?,
    };

    serde_json::from_value(value).map_err(|e| GenerationError::Schema(e.to_string()))
}

/// [`StructuredGenerator`] backed by an [`LLM`] in JSON mode.
pub struct LlmGenerator<L: LLM> {
    llm: L,
}

impl<L: LLM> LlmGenerator<L> {
    pub fn new(llm: L) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl<L: LLM> StructuredGenerator for LlmGenerator<L> {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let system = format!(
            "{}\n\nRespond with a single JSON object that validates against this JSON Schema. \
             Output only the JSON, no additional text.\n{}",
            request.system, request.schema
        );
        let completion = CompletionRequest::new(request.prompt.as_str())
            .with_system(system)
            .json();

        debug!(model = self.llm.model(), prompt_chars = request.prompt.len(), "generating object");
        let response = self.llm.complete(&completion).await?;

        let json_str = extract_json(&response);
        let value: Value = serde_json::from_str(json_str).map_err(|e| {
            GenerationError::Schema(format!(
                "invalid JSON: {}. Response: {}",
                e,
                json_str.chars().take(500).collect::<String>()
            ))
        })?;

        if !value.is_object() {
            return Err(GenerationError::Schema("expected a JSON object".to_string()));
        }
        Ok(value)
    }
}

/// Extracts JSON from a response that might be wrapped in markdown code
/// blocks or surrounded by prose.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ``` or ``` ... ```
    if trimmed.starts_with("```") {
        if let Some(start) = trimmed.find('\n') {
            let rest = &trimmed[start + 1..];
            if let Some(end) = rest.rfind("```") {
                return rest[..end].trim();
            }
        }
    }

    if !trimmed.starts_with('{') {
        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    struct Scripted(String);

    #[async_trait]
    impl LLM for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, LLMError> {
            assert!(request.json);
            assert!(request.system.as_deref().unwrap_or("").contains("JSON Schema"));
            Ok(self.0.clone())
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    struct Slow;

    #[async_trait]
    impl StructuredGenerator for Slow {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Value, GenerationError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(json!({}))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Answer {
        value: u32,
    }

    #[test]
    fn test_extract_json_code_block() {
        let response = "```json\n{\"value\": 1}\n```";
        assert_eq!(extract_json(response), "{\"value\": 1}");
    }

    #[test]
    fn test_extract_json_surrounding_prose() {
        let response = "Here you go: {\"value\": 1} hope it helps";
        assert_eq!(extract_json(response), "{\"value\": 1}");
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_llm_generator_parses_object() {
        let generator = LlmGenerator::new(Scripted("```json\n{\"value\": 7}\n```".to_string()));
        let request = GenerationRequest::new("sys", "prompt", json!({"type": "object"}));
        let answer: Answer = generate_object(&generator, &request).await.unwrap();
        assert_eq!(answer.value, 7);
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_error() {
        let generator = LlmGenerator::new(Scripted("{\"other\": true}".to_string()));
        let request = GenerationRequest::new("sys", "prompt", json!({"type": "object"}));
        let result: Result<Answer, _> = generate_object(&generator, &request).await;
        assert!(matches!(result, Err(GenerationError::Schema(_))));
    }

    #[tokio::test]
    async fn test_invalid_json_is_error() {
        let generator = LlmGenerator::new(Scripted("not json at all".to_string()));
        let request = GenerationRequest::new("sys", "prompt", json!({"type": "object"}));
        let result: Result<Answer, _> = generate_object(&generator, &request).await;
        assert!(matches!(result, Err(GenerationError::Schema(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_applies_to_any_generator() {
        let request = GenerationRequest::new("sys", "prompt", json!({}))
            .with_timeout(Duration::from_secs(60));
        let result: Result<Value, _> = generate_object(&Slow, &request).await;
        assert!(matches!(result, Err(GenerationError::Timeout(d)) if d == Duration::from_secs(60)));
    }
}
