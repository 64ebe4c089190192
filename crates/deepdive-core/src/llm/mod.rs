mod claude;
mod error;
mod openai;
mod provider;

pub use claude::ClaudeClient;
pub use error::LLMError;
pub use openai::OpenAIClient;
pub use provider::Provider;

use async_trait::async_trait;

/// A single-turn completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// System message, if any.
    pub system: Option<String>,
    /// The user message.
    pub prompt: String,
    /// Ask the provider to answer with a single JSON object.
    pub json: bool,
}

impl CompletionRequest {
    /// Creates a plain-text request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            json: false,
        }
    }

    /// Sets the system message.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Requests a JSON object response.
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Trait for Large Language Model providers.
///
/// This abstraction allows swapping between different LLM providers
/// without changing the rest of the code.
///
/// # Supported Providers
///
/// - **OpenAI-compatible** (default): Works with OpenAI, Azure, Ollama, vLLM, OpenRouter, etc.
/// - **Anthropic**: Claude models via Anthropic API
/// - **Ollama**: Local models via Ollama
///
/// # Example
///
/// ```ignore
/// use deepdive_core::llm::{CompletionRequest, Provider, LLM};
///
/// let llm = Provider::from_env()?;
/// let request = CompletionRequest::new("List three facts about Rust").json();
/// let response = llm.complete(&request).await?;
/// ```
#[async_trait]
pub trait LLM: Send + Sync {
    /// Complete a request and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LLMError>;

    /// The model identifier requests are sent to.
    fn model(&self) -> &str;
}

/// Blanket implementation for boxed trait objects.
#[async_trait]
impl LLM for Box<dyn LLM> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LLMError> {
        (**self).complete(request).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}
