use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::batch::BatchItem;
use super::context::Stage;
use super::orchestrator::RunState;
use crate::error::{AgentError, RenderError};

pub const REPORT_FILE_NAME: &str = "batch_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Accepted,
    Rejected,
    Failed,
    Cancelled,
}

impl EntryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EntryStatus::Accepted => "accepted",
            EntryStatus::Rejected => "rejected",
            EntryStatus::Failed => "failed",
            EntryStatus::Cancelled => "cancelled",
        }
    }
}

/// One line of the report per input URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub url: String,
    pub status: EntryStatus,
    pub quality_score: Option<f64>,
    pub stage: Option<Stage>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
    pub warnings: usize,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub entries: Vec<ReportEntry>,
}

impl ReportEntry {
    fn from_item(item: &BatchItem) -> Self {
        let mut entry = ReportEntry {
            url: item.url().to_string(),
            status: EntryStatus::Cancelled,
            quality_score: None,
            stage: None,
            error_kind: None,
            error: None,
            warnings: 0,
            output: None,
        };

        match item {
            BatchItem::Completed(outcome) => {
                entry.quality_score = outcome.verdict.as_ref().map(|v| v.score);
                entry.warnings = outcome.context.warnings.len();
                match &outcome.state {
                    RunState::Accepted => entry.status = EntryStatus::Accepted,
                    RunState::Rejected => {
                        entry.status = EntryStatus::Rejected;
                        entry.stage = Some(Stage::Gating);
                        entry.error_kind = Some("ValidationError".to_string());
                        entry.error = outcome.verdict.as_ref().map(|v| v.reasons.join(", "));
                    }
                    RunState::Failed(failure) => {
                        entry.status = EntryStatus::Failed;
                        entry.stage = Some(failure.stage);
                        entry.error_kind = Some(failure.error.kind().to_string());
                        entry.error = Some(failure.error.to_string());
                    }
                }
            }
            BatchItem::Cancelled { .. } => {}
            BatchItem::Aborted { reason, .. } => {
                entry.status = EntryStatus::Failed;
                entry.error_kind = Some("Aborted".to_string());
                entry.error = Some(reason.clone());
            }
        }
        entry
    }
}

impl BatchReport {
    pub fn from_items(items: &[BatchItem]) -> Self {
        let mut report = BatchReport {
            generated_at: Utc::now(),
            total: 0,
            accepted: 0,
            rejected: 0,
            failed: 0,
            cancelled: 0,
            entries: items.iter().map(ReportEntry::from_item).collect(),
        };
        report.recount();
        report
    }

    pub fn record_output(&mut self, index: usize, path: PathBuf) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.output = Some(path);
        }
    }

    /// An accepted run whose document could not be written counts as failed.
    pub fn record_render_error(&mut self, index: usize, error: &RenderError) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.status = EntryStatus::Failed;
            entry.error_kind = Some("RenderError".to_string());
            entry.error = Some(error.to_string());
        }
        self.recount();
    }

    fn recount(&mut self) {
        let entries = &self.entries;
        let count = |status| entries.iter().filter(|e| e.status == status).count();
        let (accepted, rejected, failed, cancelled) = (
            count(EntryStatus::Accepted),
            count(EntryStatus::Rejected),
            count(EntryStatus::Failed),
            count(EntryStatus::Cancelled),
        );
        self.total = entries.len();
        self.accepted = accepted;
        self.rejected = rejected;
        self.failed = failed;
        self.cancelled = cancelled;
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write `batch_report.json` into `dir`.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, AgentError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(REPORT_FILE_NAME);
        tokio::fs::write(&path, self.to_json()?).await?;
        Ok(path)
    }
}
