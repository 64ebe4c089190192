//! Default values for deepdive configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// LLM Defaults
// ============================================================================

/// Default LLM provider.
pub const DEFAULT_LLM_PROVIDER: &str = "openai";

/// Provider names accepted in `[llm] provider`.
pub const LLM_PROVIDERS: &[&str] = &["openai", "anthropic", "claude", "ollama", "openrouter"];

/// Default max tokens for LLM responses.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

// OpenAI defaults
/// Default OpenAI API URL.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
/// Default OpenAI model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

// Anthropic defaults
/// Default Anthropic API URL.
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
/// Default Anthropic model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
/// Default Anthropic API version.
pub const DEFAULT_ANTHROPIC_API_VERSION: &str = "2023-06-01";

// Ollama defaults
/// Default Ollama API URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1";
/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

// OpenRouter defaults
/// Default OpenRouter API URL.
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

// ============================================================================
// Research Defaults
// ============================================================================

/// Number of queries planned at the top level.
pub const DEFAULT_BREADTH: usize = 4;

/// Number of recursion levels.
pub const DEFAULT_DEPTH: usize = 2;

/// Branches admitted at once across the whole research tree.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 2;

/// Learnings extracted per query.
pub const DEFAULT_MAX_LEARNINGS: usize = 3;

/// Token ceiling for a single retrieved item before synthesis.
pub const DEFAULT_ITEM_TOKEN_LIMIT: usize = 25_000;

/// Timeout for one synthesis call, in seconds.
pub const DEFAULT_SYNTHESIS_TIMEOUT_SECS: u64 = 60;

/// Token ceiling for the learnings block sent to the report composer.
pub const DEFAULT_CONTEXT_TOKEN_LIMIT: usize = 150_000;

/// Clarifying questions asked before research starts.
pub const DEFAULT_FEEDBACK_QUESTIONS: usize = 3;

// ============================================================================
// Retrieval Defaults
// ============================================================================

/// Default retrieval backend.
pub const DEFAULT_RETRIEVER: &str = "duckduckgo";

/// Backend names accepted in `[retrieval] backend`.
pub const RETRIEVERS: &[&str] = &["duckduckgo", "ddg", "command"];

/// DuckDuckGo HTML endpoint.
pub const DEFAULT_DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";

/// Results kept per query.
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Attempts made against a rate-limited search backend.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// First backoff delay after a rate limit, in milliseconds. Doubles per attempt.
pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// User agent sent to search backends.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = ".deepdive";

/// Default runs subdirectory.
pub const DEFAULT_RUNS_DIR: &str = "runs";

/// Default run metadata file name.
pub const DEFAULT_RUN_FILE: &str = "run.json";

/// Default report file name.
pub const DEFAULT_REPORT_FILE: &str = "report.md";

/// Project-local config file name.
pub const DEFAULT_CONFIG_FILE: &str = "deepdive.toml";
