use std::future::Future;

use crate::config::LoginSpec;
use crate::error::AppError;
use crate::job::{JobOutcome, JobProgress, PageResult};

/// Fetches raw page markup from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Performs an optional form login before the fetch loop starts.
///
/// Only the pass/fail signal matters to the orchestrator; session state
/// (cookies) is the implementation's business.
pub trait Authenticator: Send + Sync {
    fn login(&self, spec: &LoginSpec) -> impl Future<Output = Result<bool, AppError>> + Send;
}

/// Turns fetched markup into records and image URLs.
///
/// Synchronous on purpose: parsing and selector evaluation never await,
/// and the parsed trees are not `Send` — they must not outlive one call.
pub trait Harvester: Send + Sync + Clone {
    fn harvest(&self, url: &str, markup: &str) -> Result<PageResult, AppError>;
}

/// Downloads one image, returning the local path it was written to.
pub trait ImageDownloader: Send + Sync + Clone {
    fn download(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// External persistence sink for the finished job.
pub trait RecordSink: Send + Sync + Clone {
    fn persist(&self, outcome: &JobOutcome) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Receives one progress snapshot per URL boundary (decoupled reporting).
pub trait ProgressObserver: Send + Sync {
    fn publish(&self, progress: JobProgress) {
        let _ = progress;
    }
}

/// Observer that drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {}

/// Observer that logs snapshots via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn publish(&self, progress: JobProgress) {
        tracing::info!(
            current = progress.current,
            total = progress.total,
            url = %progress.url,
            status = %progress.status,
            "Progress"
        );
    }
}

/// A no-op RecordSink for use when persistence is not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    async fn persist(&self, _outcome: &JobOutcome) -> Result<(), AppError> {
        Ok(())
    }
}

/// A no-op ImageDownloader that hands back the source URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDownloader;

impl ImageDownloader for NullDownloader {
    async fn download(&self, url: &str) -> Result<String, AppError> {
        Ok(url.to_string())
    }
}
