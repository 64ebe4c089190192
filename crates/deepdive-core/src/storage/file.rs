use std::fs;
use std::path::PathBuf;

use tracing::debug;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::run::{ResearchRun, RunSummary};

use super::error::StorageError;
use super::Storage;

/// File-based storage implementation.
///
/// ```text
/// .deepdive/
///   runs/{run-id}/
///     run.json      # Run metadata, learnings and sources
///     report.md     # Rendered report or answer
/// ```
pub struct FileStorage {
    config: StorageConfig,
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStorage {
    /// Creates a new FileStorage with default config.
    pub fn new() -> Self {
        Self::with_config(StorageConfig::default())
    }

    /// Creates a new FileStorage with custom configuration.
    pub fn with_config(config: StorageConfig) -> Self {
        Self { config }
    }

    fn runs_dir(&self) -> PathBuf {
        self.config.runs_path()
    }

    /// Rejects IDs that are not UUIDs, so an ID never resolves outside the
    /// runs directory.
    fn run_dir(&self, id: &str) -> Result<PathBuf, StorageError> {
        Uuid::parse_str(id).map_err(|_| StorageError::InvalidRunId(id.to_string()))?;
        Ok(self.config.run_path(id))
    }

    fn run_file(&self, id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.run_dir(id)?.join(&self.config.run_file))
    }

    /// Path of a run's report file.
    pub fn report_file(&self, id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.run_dir(id)?.join(&self.config.report_file))
    }
}

impl Storage for FileStorage {
    fn save_run(&self, run: &ResearchRun) -> Result<(), StorageError> {
        let dir = self.run_dir(&run.id)?;
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let path = self.run_file(&run.id)?;
        let json = serde_json::to_string_pretty(run)?;
        fs::write(&path, json).map_err(|e| StorageError::io(&path, e))?;

        if let Some(report) = &run.report {
            let path = self.report_file(&run.id)?;
            fs::write(&path, report).map_err(|e| StorageError::io(&path, e))?;
        }

        debug!(run_id = %run.id, "saved run");
        Ok(())
    }

    fn load_run(&self, id: &str) -> Result<ResearchRun, StorageError> {
        let path = self.run_file(id)?;
        if !path.exists() {
            return Err(StorageError::RunNotFound(id.to_string()));
        }

        let json = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        let mut run: ResearchRun = serde_json::from_str(&json)?;

        let report_path = self.report_file(id)?;
        if report_path.exists() {
            let report =
                fs::read_to_string(&report_path).map_err(|e| StorageError::io(&report_path, e))?;
            run.report = Some(report);
        }

        Ok(run)
    }

    fn list_runs(&self) -> Result<Vec<RunSummary>, StorageError> {
        let runs_dir = self.runs_dir();
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();

        let entries = fs::read_dir(&runs_dir).map_err(|e| StorageError::io(&runs_dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&runs_dir, e))?;
            let path = entry.path();

            if path.is_dir() {
                if let Some(id) = path.file_name().and_then(|n| n.to_str()) {
                    match self.load_run(id) {
                        Ok(run) => summaries.push(run.to_summary()),
                        Err(e) => debug!(run_id = id, error = %e, "skipping unreadable run"),
                    }
                }
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(summaries)
    }

    fn delete_run(&self, id: &str) -> Result<(), StorageError> {
        let dir = self.run_dir(id)?;
        if !dir.exists() {
            return Err(StorageError::RunNotFound(id.to_string()));
        }

        fs::remove_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        Ok(())
    }
}
