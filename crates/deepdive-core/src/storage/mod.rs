mod error;
mod file;

pub use error::StorageError;
pub use file::FileStorage;

use crate::run::{ResearchRun, RunSummary};

/// Trait for run storage backends.
pub trait Storage {
    /// Saves a run, including its report if present.
    fn save_run(&self, run: &ResearchRun) -> Result<(), StorageError>;

    /// Loads a run by ID, with its report if one was saved.
    fn load_run(&self, id: &str) -> Result<ResearchRun, StorageError>;

    /// Lists all runs as summaries, newest first.
    fn list_runs(&self) -> Result<Vec<RunSummary>, StorageError>;

    /// Deletes a run and its report.
    fn delete_run(&self, id: &str) -> Result<(), StorageError>;
}
