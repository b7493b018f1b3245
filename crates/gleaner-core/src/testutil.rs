//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use crate::config::{Dialect, FieldSpec, LoginSpec, ScrapeConfig};
use crate::error::AppError;
use crate::job::{JobOutcome, JobProgress, PageResult};
use crate::traits::{
    Authenticator, Fetcher, Harvester, ImageDownloader, ProgressObserver, RecordSink,
};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response queue.
#[derive(Clone, Debug)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    login_result: Arc<Mutex<Result<bool, AppError>>>,
    pub fetched_urls: Arc<Mutex<Vec<String>>>,
    pub login_calls: Arc<Mutex<u32>>,
}

impl MockFetcher {
    pub fn new(markup: &str) -> Self {
        Self::with_responses(vec![Ok(markup.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            login_result: Arc::new(Mutex::new(Ok(true))),
            fetched_urls: Arc::new(Mutex::new(Vec::new())),
            login_calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_login_result(self, result: Result<bool, AppError>) -> Self {
        *self.login_result.lock().unwrap() = result;
        self
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.fetched_urls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

impl Authenticator for MockFetcher {
    async fn login(&self, _spec: &LoginSpec) -> Result<bool, AppError> {
        *self.login_calls.lock().unwrap() += 1;
        match &*self.login_result.lock().unwrap() {
            Ok(ok) => Ok(*ok),
            Err(e) => Err(AppError::Generic(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// MockHarvester
// ---------------------------------------------------------------------------

/// Mock harvester that replays a queue of page results.
#[derive(Clone, Debug)]
pub struct MockHarvester {
    pages: Arc<Mutex<Vec<Result<PageResult, AppError>>>>,
}

impl MockHarvester {
    /// Harvester yielding an empty page for every call.
    pub fn empty() -> Self {
        Self::with_pages(Vec::new())
    }

    pub fn with_pages(pages: Vec<Result<PageResult, AppError>>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages)),
        }
    }
}

impl Harvester for MockHarvester {
    fn harvest(&self, url: &str, _markup: &str) -> Result<PageResult, AppError> {
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            Ok(PageResult {
                url: url.to_string(),
                ..PageResult::default()
            })
        } else {
            pages.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockDownloader
// ---------------------------------------------------------------------------

/// Mock image downloader returning a fixed local path.
#[derive(Clone)]
pub struct MockDownloader {
    path: String,
    error: Arc<Mutex<Option<AppError>>>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockDownloader {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            error: Arc::new(Mutex::new(None)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        let downloader = Self::new("");
        *downloader.error.lock().unwrap() = Some(error);
        downloader
    }
}

impl ImageDownloader for MockDownloader {
    async fn download(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        let mut error = self.error.lock().unwrap();
        if let Some(e) = error.take() {
            return Err(e);
        }
        Ok(self.path.clone())
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock sink that records persisted outcomes.
#[derive(Clone)]
pub struct MockSink {
    pub persisted: Arc<Mutex<Vec<JobOutcome>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            persisted: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        let sink = Self::new();
        *sink.error.lock().unwrap() = Some(error);
        sink
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSink for MockSink {
    async fn persist(&self, outcome: &JobOutcome) -> Result<(), AppError> {
        let mut error = self.error.lock().unwrap();
        if let Some(e) = error.take() {
            return Err(e);
        }
        self.persisted.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockObserver
// ---------------------------------------------------------------------------

/// Observer recording every published progress snapshot.
#[derive(Default)]
pub struct MockObserver {
    pub snapshots: Arc<Mutex<Vec<JobProgress>>>,
}

impl MockObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressObserver for MockObserver {
    fn publish(&self, progress: JobProgress) {
        self.snapshots.lock().unwrap().push(progress);
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Minimal valid page-mode config for testing.
pub fn make_test_config() -> ScrapeConfig {
    ScrapeConfig::new(
        "https://example.com/list",
        vec![FieldSpec {
            name: "title".into(),
            selector: "h1".into(),
            dialect: Dialect::Css,
            attribute: None,
            required: false,
        }],
    )
}
