//! Survey job parameters and per-run session bookkeeping.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppResult, ScanError};

/// Parameters of one automated survey run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureJob {
    /// Tool identifier as entered by the operator.
    pub tool_id: String,
    /// Number of cutting flutes; determines the angular positions per layer.
    pub flute_count: u32,
    /// Number of height layers surveyed below the top reference.
    pub layer_count: u32,
}

impl CaptureJob {
    pub fn new(tool_id: impl Into<String>, flute_count: u32, layer_count: u32) -> Self {
        Self {
            tool_id: tool_id.into(),
            flute_count,
            layer_count,
        }
    }

    /// Field validation; rejected jobs never reach hardware.
    pub fn validate(&self) -> AppResult<()> {
        if self.tool_id.trim().is_empty() {
            return Err(ScanError::Precondition("tool id is required".into()));
        }
        if self.flute_count == 0 {
            return Err(ScanError::Precondition(
                "flute count must be at least 1".into(),
            ));
        }
        if self.layer_count == 0 {
            return Err(ScanError::Precondition(
                "layer count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Folder name shared by every image of this job.
    pub fn folder_name(&self) -> String {
        format!(
            "T{}_FL{}_OD{}",
            self.tool_id, self.flute_count, self.layer_count
        )
    }
}

/// Accumulating state of one survey run. Created when the run starts, fed by
/// each sequencer step, finalized exactly once.
#[derive(Debug)]
pub struct SurveySession {
    pub id: Uuid,
    pub job: CaptureJob,
    pub started_at: DateTime<Utc>,
    files: Vec<PathBuf>,
}

impl SurveySession {
    pub fn begin(job: CaptureJob) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            started_at: Utc::now(),
            files: Vec::new(),
        }
    }

    /// Appends the files written by one capture call, preserving order.
    pub fn record(&mut self, files: Vec<PathBuf>) {
        self.files.extend(files);
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Consumes the session into its final report.
    pub fn finalize(self) -> SurveyReport {
        let finished_at = Utc::now();
        let elapsed = (finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        SurveyReport {
            session_id: self.id,
            job: self.job,
            files: self.files,
            elapsed,
        }
    }
}

/// Outcome of a completed survey run.
#[derive(Clone, Debug)]
pub struct SurveyReport {
    pub session_id: Uuid,
    pub job: CaptureJob,
    /// Every file written, in capture order.
    pub files: Vec<PathBuf>,
    pub elapsed: Duration,
}
