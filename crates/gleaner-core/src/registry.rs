//! In-process job registry: submit, poll, cancel.
//!
//! The one piece of state shared between a job's sequential worker task
//! and external pollers. All mutation goes through a lock-guarded map and
//! all reads come out as cloned snapshots, so a poller can never observe
//! a half-updated progress view.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ScrapeConfig;
use crate::error::AppError;
use crate::job::{JobOutcome, JobProgress, JobStatus};
use crate::orchestrator::ScrapeOrchestrator;
use crate::traits::{Authenticator, Fetcher, Harvester, ImageDownloader, ProgressObserver, RecordSink};

struct JobEntry {
    status: JobStatus,
    progress: JobProgress,
    outcome: Option<JobOutcome>,
    error: Option<String>,
    cancel: CancellationToken,
    submitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of one job, cloned out from behind the lock.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub outcome: Option<JobOutcome>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Concurrent job-id → state map; jobs run as independent spawned tasks.
///
/// Each submitted job owns its own fetcher/harvester/dedup state — the
/// registry shares nothing between jobs except this map.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config, then spawn the job; returns its id.
    ///
    /// Validation errors surface synchronously — a rejected job never
    /// appears in the registry.
    pub fn submit<F, H, D, S>(
        &self,
        config: ScrapeConfig,
        fetcher: F,
        harvester: H,
        downloader: D,
        sink: S,
    ) -> Result<Uuid, AppError>
    where
        F: Fetcher + Authenticator + 'static,
        H: Harvester + 'static,
        D: ImageDownloader + 'static,
        S: RecordSink + 'static,
    {
        self.submit_with_token(
            config,
            CancellationToken::new(),
            fetcher,
            harvester,
            downloader,
            sink,
        )
    }

    /// [`Self::submit`] with a caller-provided cancellation token, for
    /// callers whose fetcher components already observe the same token.
    pub fn submit_with_token<F, H, D, S>(
        &self,
        config: ScrapeConfig,
        cancel: CancellationToken,
        fetcher: F,
        harvester: H,
        downloader: D,
        sink: S,
    ) -> Result<Uuid, AppError>
    where
        F: Fetcher + Authenticator + 'static,
        H: Harvester + 'static,
        D: ImageDownloader + 'static,
        S: RecordSink + 'static,
    {
        let orchestrator = ScrapeOrchestrator::new(config, fetcher, harvester, downloader, sink)?;

        let id = Uuid::new_v4();
        {
            let mut jobs = self.jobs.write().unwrap();
            jobs.insert(
                id,
                JobEntry {
                    status: JobStatus::Queued,
                    progress: JobProgress::queued(),
                    outcome: None,
                    error: None,
                    cancel: cancel.clone(),
                    submitted_at: Utc::now(),
                    finished_at: None,
                },
            );
        }

        let registry = self.clone();
        tokio::spawn(async move {
            registry.set_status(id, JobStatus::Running);
            let observer = RegistryObserver {
                registry: registry.clone(),
                id,
            };
            match orchestrator.run(cancel, &observer).await {
                Ok(outcome) => registry.finish(id, JobStatus::Completed, Some(outcome), None),
                Err(AppError::Cancelled) => {
                    registry.finish(id, JobStatus::Cancelled, None, None);
                }
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "Job errored");
                    registry.finish(id, JobStatus::Failed, None, Some(e.to_string()));
                }
            }
        });

        Ok(id)
    }

    /// Consistent snapshot of a job, or `None` for unknown ids.
    pub fn snapshot(&self, id: Uuid) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().unwrap();
        jobs.get(&id).map(|entry| JobSnapshot {
            id,
            status: entry.status,
            progress: entry.progress.clone(),
            outcome: entry.outcome.clone(),
            error: entry.error.clone(),
            submitted_at: entry.submitted_at,
            finished_at: entry.finished_at,
        })
    }

    pub fn progress(&self, id: Uuid) -> Option<JobProgress> {
        let jobs = self.jobs.read().unwrap();
        jobs.get(&id).map(|entry| entry.progress.clone())
    }

    /// Trigger a job's cancellation token. Returns false for unknown or
    /// already-finished jobs.
    pub fn cancel(&self, id: Uuid) -> bool {
        let jobs = self.jobs.read().unwrap();
        match jobs.get(&id) {
            Some(entry) if !entry.status.is_terminal() => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Ids of all known jobs with their current status.
    pub fn list(&self) -> Vec<(Uuid, JobStatus)> {
        let jobs = self.jobs.read().unwrap();
        jobs.iter().map(|(id, e)| (*id, e.status)).collect()
    }

    /// Drop a terminal job from the map, returning its final snapshot.
    pub fn remove(&self, id: Uuid) -> Option<JobSnapshot> {
        let snapshot = self.snapshot(id)?;
        if !snapshot.status.is_terminal() {
            return None;
        }
        self.jobs.write().unwrap().remove(&id);
        Some(snapshot)
    }

    fn set_status(&self, id: Uuid, status: JobStatus) {
        let mut jobs = self.jobs.write().unwrap();
        if let Some(entry) = jobs.get_mut(&id) {
            entry.status = status;
            entry.progress.status = status;
        }
    }

    fn set_progress(&self, id: Uuid, progress: JobProgress) {
        let mut jobs = self.jobs.write().unwrap();
        if let Some(entry) = jobs.get_mut(&id) {
            entry.progress = progress;
        }
    }

    fn finish(
        &self,
        id: Uuid,
        status: JobStatus,
        outcome: Option<JobOutcome>,
        error: Option<String>,
    ) {
        let mut jobs = self.jobs.write().unwrap();
        if let Some(entry) = jobs.get_mut(&id) {
            entry.status = status;
            entry.progress.status = status;
            entry.outcome = outcome;
            entry.error = error;
            entry.finished_at = Some(Utc::now());
        }
    }
}

/// Observer wiring orchestrator progress back into the registry map.
struct RegistryObserver {
    registry: JobRegistry,
    id: Uuid,
}

impl ProgressObserver for RegistryObserver {
    fn publish(&self, progress: JobProgress) {
        self.registry.set_progress(self.id, progress);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{PaginationMode, PaginationSpec};
    use crate::testutil::*;
    use crate::traits::{NullDownloader, NullSink};

    async fn wait_terminal(registry: &JobRegistry, id: Uuid) -> JobSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(snapshot) = registry.snapshot(id)
                    && snapshot.status.is_terminal()
                {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not reach a terminal state")
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_synchronously() {
        let registry = JobRegistry::new();
        let mut config = make_test_config();
        config.url = String::new();

        let err = registry
            .submit(
                config,
                MockFetcher::new("<html></html>"),
                MockHarvester::empty(),
                NullDownloader,
                NullSink,
            )
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidConfig(_)));
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn submitted_job_runs_to_completion() {
        let registry = JobRegistry::new();
        let mut config = make_test_config();
        config.inter_request_delay_secs = 0.0;

        let id = registry
            .submit(
                config,
                MockFetcher::new("<html></html>"),
                MockHarvester::empty(),
                NullDownloader,
                NullSink,
            )
            .unwrap();

        let snapshot = wait_terminal(&registry, id).await;
        assert_eq!(snapshot.status, JobStatus::Completed);
        let outcome = snapshot.outcome.unwrap();
        assert_eq!(outcome.stats.pages_attempted, 1);
        assert_eq!(snapshot.progress.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_moves_the_job_to_cancelled() {
        let registry = JobRegistry::new();
        let mut config = make_test_config();
        // Enough pages and delay that cancellation lands mid-run.
        config.inter_request_delay_secs = 0.05;
        config.pagination = Some(PaginationSpec {
            mode: PaginationMode::QueryParam,
            param_name: "page".into(),
            start_page: 1,
            end_page: 50,
        });

        let id = registry
            .submit(
                config,
                MockFetcher::with_responses(Vec::new()),
                MockHarvester::empty(),
                NullDownloader,
                NullSink,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(registry.cancel(id));

        let snapshot = wait_terminal(&registry, id).await;
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.outcome.is_none());
    }

    #[tokio::test]
    async fn cancel_of_unknown_job_returns_false() {
        let registry = JobRegistry::new();
        assert!(!registry.cancel(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn remove_only_drops_terminal_jobs() {
        let registry = JobRegistry::new();
        let mut config = make_test_config();
        config.inter_request_delay_secs = 0.0;

        let id = registry
            .submit(
                config,
                MockFetcher::new("<html></html>"),
                MockHarvester::empty(),
                NullDownloader,
                NullSink,
            )
            .unwrap();

        wait_terminal(&registry, id).await;
        assert!(registry.remove(id).is_some());
        assert!(registry.snapshot(id).is_none());
    }
}
