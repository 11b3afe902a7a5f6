//! `ActivityReport`: an in-memory log of orchestrator steps, flushed to a
//! markdown file when `Config::report` is set.
//!
//! Rendering is a hand-written template rather than a markdown-generation
//! crate.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub enum ReportOutcome {
    Ok,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub step: String,
    pub detail: String,
    pub outcome: ReportOutcome,
}

/// Accumulates [`ReportEntry`] values over the course of one orchestrator
/// operation (install, make, remove, …).
#[derive(Debug, Clone, Default)]
pub struct ActivityReport {
    entries: Vec<ReportEntry>,
}

impl ActivityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_ok(&mut self, step: impl Into<String>, detail: impl Into<String>) {
        self.entries.push(ReportEntry {
            step: step.into(),
            detail: detail.into(),
            outcome: ReportOutcome::Ok,
        });
    }

    pub fn log_failure(&mut self, step: impl Into<String>, detail: impl Into<String>, error: impl fmt::Display) {
        self.entries.push(ReportEntry {
            step: step.into(),
            detail: detail.into(),
            outcome: ReportOutcome::Failed(error.to_string()),
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Renders the accumulated entries as a markdown document titled after
    /// `operation` (e.g. `"install"`).
    pub fn render_markdown(&self, operation: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("# ldist activity report: {operation}\n\n"));
        if self.entries.is_empty() {
            out.push_str("_no steps recorded_\n");
            return out;
        }
        for entry in &self.entries {
            match &entry.outcome {
                ReportOutcome::Ok => out.push_str(&format!("- [x] **{}** — {}\n", entry.step, entry.detail)),
                ReportOutcome::Failed(err) => {
                    out.push_str(&format!("- [ ] **{}** — {}\n  - error: {err}\n", entry.step, entry.detail))
                }
            }
        }
        out
    }

    /// Writes the rendered report to `<cwd>/ldist-report-<operation>.md`.
    pub fn flush(&self, operation: &str, cwd: &Path) -> std::io::Result<PathBuf> {
        let path = cwd.join(format!("ldist-report-{operation}.md"));
        std::fs::write(&path, self.render_markdown(operation))?;
        Ok(path)
    }
}
