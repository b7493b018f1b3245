use thiserror::Error;

/// Application-wide error types for Gleaner.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// All retry attempts for a fetch were exhausted.
    #[error("Fetch exhausted after {attempts} attempts: {source}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    /// Markup could not be parsed into a queryable tree.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A selector failed to compile or evaluate.
    #[error("Selector error: {0}")]
    SelectorError(String),

    /// A field marked `required` produced no value; the record is discarded.
    #[error("Required field '{0}' missing")]
    RequiredFieldMissing(String),

    /// Browser renderer failed to start or navigate.
    #[error("Renderer error: {0}")]
    RenderError(String),

    /// Job configuration rejected before the run started.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Result sink write failure; reported in the outcome, records stand.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// The job's cancellation token fired.
    #[error("Job cancelled")]
    Cancelled,

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Filesystem operation failed (image/export output).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::HttpError(msg) => {
                msg.contains("timeout")
                    || msg.contains("connect")
                    || msg.contains("reset")
                    || status_in_message(msg).is_some_and(|s| s >= 500)
            }
            _ => false,
        }
    }

    /// Returns true if the error must stop the job before it starts.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::InvalidConfig(_))
    }
}

/// Pull an "HTTP NNN" status code out of an error message, if present.
fn status_in_message(msg: &str) -> Option<u16> {
    let rest = msg.strip_prefix("HTTP ")?;
    rest.split_whitespace().next()?.parse().ok()
}
