pub mod budget;
pub mod config;
pub mod generate;
pub mod llm;
pub mod research;
pub mod retrieve;
pub mod run;
pub mod storage;

pub use budget::{TextBudgeter, TokenCounter};
pub use config::{
    Config, ConfigError, LLMConfig, ResearchConfig, RetrievalConfig, StorageConfig,
};
pub use generate::{generate_object, GenerationError, GenerationRequest, LlmGenerator, StructuredGenerator};
pub use llm::{LLMError, Provider, LLM};
pub use research::{
    clarifying_questions, combine_query, ProgressReporter, ReportComposer, ResearchError,
    ResearchQuery, ResearchResult, ResearchRunner, SilentProgress,
};
pub use retrieve::{ContentItem, ContentRetriever, RetrievalError, Retriever};
pub use run::{ResearchRun, RunSummary};
pub use storage::{FileStorage, Storage, StorageError};
