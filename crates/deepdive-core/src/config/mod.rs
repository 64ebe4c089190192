//! Configuration management for deepdive.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `deepdive.toml` file
//! 3. User config `~/.config/deepdive/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration.
    pub llm: LLMConfig,

    /// Research traversal configuration.
    pub research: ResearchConfig,

    /// Content retrieval configuration.
    pub retrieval: RetrievalConfig,

    /// Storage configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./deepdive.toml` (project local)
    /// 2. `~/.config/deepdive/config.toml` (user config)
    /// 3. Falls back to defaults
    ///
    /// Environment overrides are applied in every case.
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_file(DEFAULT_CONFIG_FILE);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("deepdive").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_overrides(process_env);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_with_env(&content, process_env)
    }

    /// Parses TOML, applies overrides read through `env`, then validates.
    pub fn from_toml_with_env(
        content: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;

        config.apply_overrides(env);
        config.validate()?;

        Ok(config)
    }

    /// Applies `DEEPDIVE_*` overrides read through `env`. Numeric values that
    /// fail to parse are ignored.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        let parse = |key: &str| env(key).and_then(|v| v.trim().parse::<usize>().ok());

        if let Some(provider) = env("DEEPDIVE_LLM_PROVIDER") {
            self.llm.provider = provider.to_lowercase();
        }
        if let Some(model) = env("DEEPDIVE_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(url) = env("DEEPDIVE_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(key) = env("DEEPDIVE_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(n) = env("DEEPDIVE_LLM_MAX_TOKENS").and_then(|v| v.trim().parse().ok()) {
            self.llm.max_tokens = n;
        }

        if let Some(n) = parse("DEEPDIVE_BREADTH") {
            self.research.breadth = n;
        }
        if let Some(n) = parse("DEEPDIVE_DEPTH") {
            self.research.depth = n;
        }
        if let Some(n) = parse("DEEPDIVE_CONCURRENCY") {
            self.research.concurrency_limit = n;
        }

        if let Some(backend) = env("DEEPDIVE_RETRIEVER") {
            self.retrieval.backend = backend;
        }
        if let Some(command) = env("DEEPDIVE_RETRIEVER_COMMAND") {
            self.retrieval.command = Some(command);
        }

        if let Some(dir) = env("DEEPDIVE_DATA_DIR") {
            self.storage.data_dir = dir;
        }
    }

    /// Rejects settings the research loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown llm.provider \"{}\" (expected one of: {})",
                self.llm.provider,
                LLM_PROVIDERS.join(", ")
            )));
        }
        if !RETRIEVERS.contains(&self.retrieval.backend.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown retrieval.backend \"{}\" (expected one of: {})",
                self.retrieval.backend,
                RETRIEVERS.join(", ")
            )));
        }
        if self.research.concurrency_limit == 0 {
            return Err(ConfigError::Invalid(
                "research.concurrency_limit must be at least 1".to_string(),
            ));
        }
        if self.retrieval.backend == "command" && self.retrieval.command.is_none() {
            return Err(ConfigError::Invalid(
                "retrieval.command is required when retrieval.backend = \"command\"".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// Provider name: "openai", "anthropic", "ollama", or "openrouter".
    pub provider: String,

    /// Model name (provider-specific).
    pub model: Option<String>,

    /// Base URL for API (for openai-compatible providers).
    pub base_url: Option<String>,

    /// API key (can also be set via environment variable).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Maximum tokens for response.
    pub max_tokens: u32,

    /// API version (for Anthropic).
    pub api_version: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_LLM_PROVIDER.to_string(),
            model: None,
            base_url: None,
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_version: Some(DEFAULT_ANTHROPIC_API_VERSION.to_string()),
        }
    }
}

impl LLMConfig {
    /// Get the model name, falling back to provider defaults.
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider.as_str() {
            "anthropic" | "claude" => DEFAULT_ANTHROPIC_MODEL.to_string(),
            "ollama" => DEFAULT_OLLAMA_MODEL.to_string(),
            _ => DEFAULT_OPENAI_MODEL.to_string(),
        })
    }

    /// Get the base URL, falling back to provider defaults.
    pub fn base_url_or_default(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| match self.provider.as_str() {
            "anthropic" | "claude" => DEFAULT_ANTHROPIC_URL.to_string(),
            "ollama" => DEFAULT_OLLAMA_URL.to_string(),
            "openrouter" => DEFAULT_OPENROUTER_URL.to_string(),
            _ => DEFAULT_OPENAI_URL.to_string(),
        })
    }

    /// Get API key from config or environment.
    pub fn api_key_or_env(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("DEEPDIVE_LLM_API_KEY").ok())
            .or_else(|| match self.provider.as_str() {
                "anthropic" | "claude" => std::env::var("ANTHROPIC_API_KEY").ok(),
                "openrouter" => std::env::var("OPENROUTER_API_KEY").ok(),
                "ollama" => None,
                _ => std::env::var("OPENAI_API_KEY").ok(),
            })
    }
}

/// Research traversal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Queries planned at the top level; halves (rounding up) per level.
    pub breadth: usize,

    /// Recursion levels.
    pub depth: usize,

    /// Branches admitted at once across the whole research tree.
    pub concurrency_limit: usize,

    /// Learnings extracted per query.
    pub max_learnings: usize,

    /// Token ceiling applied to each retrieved item before synthesis.
    pub item_token_limit: usize,

    /// Timeout for one synthesis call, in seconds.
    pub synthesis_timeout_secs: u64,

    /// Token ceiling for the learnings sent to the report composer.
    pub context_token_limit: usize,

    /// Clarifying questions asked before research starts.
    pub feedback_questions: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            breadth: DEFAULT_BREADTH,
            depth: DEFAULT_DEPTH,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            max_learnings: DEFAULT_MAX_LEARNINGS,
            item_token_limit: DEFAULT_ITEM_TOKEN_LIMIT,
            synthesis_timeout_secs: DEFAULT_SYNTHESIS_TIMEOUT_SECS,
            context_token_limit: DEFAULT_CONTEXT_TOKEN_LIMIT,
            feedback_questions: DEFAULT_FEEDBACK_QUESTIONS,
        }
    }
}

impl ResearchConfig {
    /// The synthesis timeout as a [`Duration`].
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}

/// Content retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Backend name: "duckduckgo" or "command".
    pub backend: String,

    /// Program run by the command backend. The query is passed as the last argument.
    pub command: Option<String>,

    /// Extra arguments placed before the query.
    pub args: Vec<String>,

    /// Override for the search endpoint.
    pub base_url: Option<String>,

    /// Results kept per query.
    pub max_results: usize,

    /// Attempts made when the backend rate-limits.
    pub max_retries: u32,

    /// First backoff delay in milliseconds.
    pub initial_retry_delay_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_RETRIEVER.to_string(),
            command: None,
            args: Vec::new(),
            base_url: None,
            max_results: DEFAULT_MAX_RESULTS,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_retry_delay_ms: DEFAULT_INITIAL_RETRY_DELAY_MS,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for deepdive data (default: ".deepdive").
    pub data_dir: String,

    /// Runs subdirectory name.
    pub runs_dir: String,

    /// Run metadata file name.
    pub run_file: String,

    /// Report file name.
    pub report_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            runs_dir: DEFAULT_RUNS_DIR.to_string(),
            run_file: DEFAULT_RUN_FILE.to_string(),
            report_file: DEFAULT_REPORT_FILE.to_string(),
        }
    }
}

impl StorageConfig {
    /// Get the full path to the runs directory.
    pub fn runs_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.runs_dir)
    }

    /// Get the full path to a run directory.
    pub fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_path().join(run_id)
    }
}
