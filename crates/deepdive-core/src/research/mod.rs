mod feedback;
mod planner;
mod progress;
pub mod prompts;
mod report;
mod result;
mod runner;
mod synthesizer;

pub use feedback::{clarifying_questions, combine_query};
pub use planner::{QueryPlanner, ResearchQuery, DEFAULT_RESEARCH_GOAL};
pub use progress::{ProgressReporter, SilentProgress};
pub use report::{fallback_report, sources_section, ReportComposer};
pub use result::ResearchResult;
pub use runner::{child_breadth, ResearchError, ResearchRunner};
pub use synthesizer::{ResultSynthesizer, SynthesisResult};
