pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod job;
pub mod orchestrator;
pub mod paginate;
pub mod proxy;
pub mod record;
pub mod registry;
pub mod retry;
pub mod stats;
pub mod testutil;
pub mod throttle;
pub mod traits;

pub use config::{ContainerSpec, Dialect, FieldSpec, ScrapeConfig, Selector};
pub use dedup::Deduplicator;
pub use error::AppError;
pub use export::ExportFormat;
pub use job::{JobOutcome, JobProgress, JobStatus, PageResult};
pub use orchestrator::ScrapeOrchestrator;
pub use proxy::ProxyRotator;
pub use record::{Record, compute_hash};
pub use registry::JobRegistry;
pub use retry::{RetryExecutor, RetryMode};
pub use stats::Stats;
pub use throttle::RateLimiter;
pub use traits::{Authenticator, Fetcher, Harvester, ImageDownloader, ProgressObserver, RecordSink};
