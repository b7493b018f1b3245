//! Job orchestration: the fetch → parse → extract → dedup loop.
//!
//! One [`ScrapeOrchestrator`] runs one job, strictly sequentially. The
//! lifecycle is `Idle → Initializing → Running → Finalizing →
//! Completed | Failed`; `Failed` is reserved for configuration rejection
//! in [`ScrapeOrchestrator::new`] — once the loop is running, a failed
//! page only increments `pages_failed` and the loop moves on.
//!
//! Generic over all external dependencies via traits, enabling dependency
//! injection and testability without real HTTP or a real browser. The
//! fetcher owns any renderer it launched; because `run` consumes the
//! orchestrator, dropping it releases that renderer on every exit path,
//! cancellation included.

use tokio_util::sync::CancellationToken;

use crate::config::ScrapeConfig;
use crate::dedup::Deduplicator;
use crate::error::AppError;
use crate::job::{JobOutcome, JobProgress, JobStatus};
use crate::paginate;
use crate::record::Record;
use crate::stats::Stats;
use crate::traits::{Authenticator, Fetcher, Harvester, ImageDownloader, ProgressObserver, RecordSink};

/// Sequences fetching, extraction, dedup, images, and the sink for one job.
#[derive(Debug)]
pub struct ScrapeOrchestrator<F, H, D, S>
where
    F: Fetcher + Authenticator,
    H: Harvester,
    D: ImageDownloader,
    S: RecordSink,
{
    config: ScrapeConfig,
    urls: Vec<String>,
    fetcher: F,
    harvester: H,
    downloader: D,
    sink: S,
    dedup: Deduplicator,
}

impl<F, H, D, S> ScrapeOrchestrator<F, H, D, S>
where
    F: Fetcher + Authenticator,
    H: Harvester,
    D: ImageDownloader,
    S: RecordSink,
{
    /// Validate the configuration and plan the URL list.
    ///
    /// The returned error is the only one ever reported synchronously to
    /// the submitter; everything after this point is absorbed into stats.
    pub fn new(
        config: ScrapeConfig,
        fetcher: F,
        harvester: H,
        downloader: D,
        sink: S,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let urls = paginate::plan(&config.url, config.pagination.as_ref())?;
        let dedup = Deduplicator::new(config.incremental);
        Ok(Self {
            config,
            urls,
            fetcher,
            harvester,
            downloader,
            sink,
            dedup,
        })
    }

    /// The planned URL sequence for this job.
    pub fn planned_urls(&self) -> &[String] {
        &self.urls
    }

    /// Run the job to completion.
    ///
    /// Consumes the orchestrator; the only error ever returned is
    /// [`AppError::Cancelled`]. Page-level failures are folded into the
    /// outcome's stats.
    pub async fn run<O: ProgressObserver>(
        self,
        cancel: CancellationToken,
        observer: &O,
    ) -> Result<JobOutcome, AppError> {
        let mut stats = Stats::default();
        stats.start();

        // Initializing: optional login; a refusal is a warning, not a stop.
        if let Some(login) = &self.config.login {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            match self.fetcher.login(login).await {
                Ok(true) => tracing::info!(url = %login.login_url, "Login successful"),
                Ok(false) => tracing::warn!(url = %login.login_url, "Login refused"),
                Err(e) => tracing::warn!(url = %login.login_url, error = %e, "Login error"),
            }
        }

        let total = self.urls.len();
        let mut records: Vec<Record> = Vec::new();
        let mut images_downloaded: Vec<String> = Vec::new();
        let delay = std::time::Duration::from_secs_f64(
            self.config.inter_request_delay_secs.max(0.0),
        );

        // Running: one URL at a time; the shared limiter/rotator state in
        // the fetcher is not built for parallel mutation.
        for (idx, url) in self.urls.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            observer.publish(JobProgress {
                current: idx + 1,
                total,
                url: url.clone(),
                status: JobStatus::Running,
            });

            stats.pages_attempted += 1;
            self.scrape_one(url, &mut stats, &mut records, &mut images_downloaded)
                .await;

            // Courtesy pause between URLs, on top of the rate limiter.
            if idx + 1 < total && !delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => return Err(AppError::Cancelled),
                }
            }
        }

        // Finalizing: stamp stats, hand records to the sink.
        stats.finish();
        let mut outcome = JobOutcome {
            records,
            duration_seconds: stats.duration_seconds(),
            stats,
            images_downloaded,
            persist_error: None,
        };

        if let Err(e) = self.sink.persist(&outcome).await {
            tracing::warn!(error = %e, "Sink write failed; records stand");
            outcome.persist_error = Some(e.to_string());
        }

        tracing::info!(
            pages = outcome.stats.pages_attempted,
            records = outcome.records.len(),
            duration_secs = outcome.duration_seconds,
            "Job finished"
        );

        Ok(outcome)
    }

    /// Fetch and harvest a single URL, folding failures into stats.
    async fn scrape_one(
        &self,
        url: &str,
        stats: &mut Stats,
        records: &mut Vec<Record>,
        images_downloaded: &mut Vec<String>,
    ) {
        let markup = match self.fetcher.fetch(url).await {
            Ok(markup) => markup,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Page fetch failed");
                stats.pages_failed += 1;
                return;
            }
        };

        let page = match self.harvester.harvest(url, &markup) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Page extraction failed");
                stats.pages_failed += 1;
                return;
            }
        };
        stats.pages_succeeded += 1;

        for record in page.records {
            if self.dedup.is_duplicate(&record) {
                tracing::debug!(%url, "Skipping duplicate record");
                continue;
            }
            stats.records_extracted += 1;
            records.push(record);
        }

        for image_url in page.images_found {
            if self.config.download_images {
                match self.downloader.download(&image_url).await {
                    Ok(path) => {
                        stats.images_downloaded += 1;
                        images_downloaded.push(path);
                    }
                    Err(e) => {
                        tracing::warn!(url = %image_url, error = %e, "Image download failed")
                    }
                }
            } else {
                images_downloaded.push(image_url);
            }
        }
    }
}
