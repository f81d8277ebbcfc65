//! Destinations for a finished analysis.

use crate::analysis::AnalysisReport;
use crate::Result;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// Accepts a computed report.
pub trait ResultSink {
    fn publish(&self, report: &AnalysisReport) -> Result<()>;
}

/// Writes the report as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonFileSink {
    fn publish(&self, report: &AnalysisReport) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(report)?;
        fs::write(&self.path, content)?;
        tracing::info!("Saved analysis to {}", self.path.display());
        Ok(())
    }
}

/// Keeps the most recent report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    last: RefCell<Option<AnalysisReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<AnalysisReport> {
        self.last.borrow().clone()
    }
}

impl ResultSink for MemorySink {
    fn publish(&self, report: &AnalysisReport) -> Result<()> {
        *self.last.borrow_mut() = Some(report.clone());
        Ok(())
    }
}
