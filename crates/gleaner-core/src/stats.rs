//! Per-job run statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Monotonically-incrementing counters for one job.
///
/// Owned exclusively by the orchestrator; snapshots are cloned into the
/// job outcome and destroyed with the job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub pages_attempted: u64,
    pub pages_succeeded: u64,
    pub pages_failed: u64,
    pub records_extracted: u64,
    pub images_downloaded: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Stats {
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration of the run, zero until both stamps exist.
    pub fn duration_seconds(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }
}
