//! Job lifecycle types: status, progress snapshots, and the final outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::stats::Stats;

/// Status of a scrape job as seen by external pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Snapshot of where a job is in its URL list.
///
/// Mutated only by the orchestrator, read by pollers as a whole value —
/// never field by field through shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: usize,
    pub total: usize,
    pub url: String,
    pub status: JobStatus,
}

impl JobProgress {
    pub fn queued() -> Self {
        Self {
            current: 0,
            total: 0,
            url: String::new(),
            status: JobStatus::Queued,
        }
    }
}

/// Everything a single page contributed to the job.
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    pub url: String,
    pub records: Vec<Record>,
    pub images_found: Vec<String>,
}

/// Final result payload handed to the sink and returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub records: Vec<Record>,
    pub stats: Stats,
    /// Local paths when downloads ran, source URLs otherwise.
    pub images_downloaded: Vec<String>,
    pub duration_seconds: f64,
    /// Sink write failure, if any; does not invalidate the records.
    pub persist_error: Option<String>,
}
