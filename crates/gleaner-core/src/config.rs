//! Declarative job configuration.
//!
//! A [`ScrapeConfig`] is the JSON-shaped description of one scrape job:
//! what to fetch, which selectors to run, and how politely to behave while
//! doing it. Unknown JSON fields are ignored; validation happens once, up
//! front, via [`ScrapeConfig::validate`] — it is the only gate that can
//! stop a job before it starts.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::export::ExportFormat;

/// Selector language used by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Css,
    Xpath,
}

/// A selector tagged with its dialect, consumed by the locator seam.
///
/// Borrowed view over a spec's selector string; extraction code matches on
/// this instead of branching on a string flag at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    Css(&'a str),
    Path(&'a str),
}

impl<'a> Selector<'a> {
    pub fn new(selector: &'a str, dialect: Dialect) -> Self {
        match dialect {
            Dialect::Css => Selector::Css(selector),
            Dialect::Xpath => Selector::Path(selector),
        }
    }

    pub fn as_str(&self) -> &'a str {
        match self {
            Selector::Css(s) | Selector::Path(s) => s,
        }
    }
}

/// Declarative description of one value to extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Record key; unique within a job.
    pub name: String,
    pub selector: String,
    #[serde(default)]
    pub dialect: Dialect,
    /// Attribute to read instead of text content (e.g. `href`).
    #[serde(default)]
    pub attribute: Option<String>,
    /// When true, a failed extraction discards the whole record.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn selector(&self) -> Selector<'_> {
        Selector::new(&self.selector, self.dialect)
    }
}

/// Repeating-item extraction: one container selector, fields per item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub selector: String,
    #[serde(default)]
    pub dialect: Dialect,
    pub fields: Vec<FieldSpec>,
}

impl ContainerSpec {
    pub fn selector(&self) -> Selector<'_> {
        Selector::new(&self.selector, self.dialect)
    }
}

/// How pagination rewrites the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaginationMode {
    /// Set/replace a query parameter (`?page=N`), preserving the rest.
    #[default]
    QueryParam,
    /// Append `/page/N` to the path.
    PathSegment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSpec {
    #[serde(default)]
    pub mode: PaginationMode,
    #[serde(default = "default_param_name")]
    pub param_name: String,
    #[serde(default = "default_page")]
    pub start_page: u32,
    #[serde(default = "default_page")]
    pub end_page: u32,
}

fn default_param_name() -> String {
    "page".to_string()
}

fn default_page() -> u32 {
    1
}

/// Rendering backend selection; resolved at fetcher construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    #[default]
    Chromium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderingSpec {
    #[serde(default)]
    pub engine: RenderEngine,
    #[serde(default)]
    pub enabled: bool,
}

/// Bounded exponential-backoff retry parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> f64 {
    1.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
        }
    }
}

/// Form-login credentials; the run only cares about the pass/fail signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSpec {
    pub login_url: String,
    pub username: String,
    pub password: String,
}

/// Immutable parameters for one scrape job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeConfig {
    /// Target URL (pagination expands from here).
    pub url: String,

    #[serde(default)]
    pub output_format: ExportFormat,

    /// Page-mode field specs; mutually exclusive with `container`.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,

    /// Item-mode container spec; mutually exclusive with `fields`.
    #[serde(default)]
    pub container: Option<ContainerSpec>,

    /// Maximum requests per second against the target.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Outbound proxies, rotated round-robin.
    #[serde(default)]
    pub proxies: Vec<String>,

    #[serde(default)]
    pub pagination: Option<PaginationSpec>,

    /// Suppress content-identical records within the job.
    #[serde(default)]
    pub incremental: bool,

    #[serde(default)]
    pub rendering: Option<RenderingSpec>,

    /// Collect image URLs matching `image_selector` from each page.
    #[serde(default)]
    pub scrape_images: bool,

    /// Also download collected images to local files.
    #[serde(default)]
    pub download_images: bool,

    #[serde(default = "default_image_selector")]
    pub image_selector: String,

    /// Courtesy pause between URLs, on top of the rate limiter.
    #[serde(default = "default_inter_request_delay")]
    pub inter_request_delay_secs: f64,

    #[serde(default)]
    pub login: Option<LoginSpec>,

    /// Override of the built-in User-Agent rotation list.
    #[serde(default)]
    pub user_agents: Option<Vec<String>>,
}

fn default_rate_limit() -> f64 {
    2.0
}

fn default_image_selector() -> String {
    "img".to_string()
}

fn default_inter_request_delay() -> f64 {
    1.0
}

impl ScrapeConfig {
    /// Minimal config for a single-page, page-mode job.
    pub fn new(url: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            url: url.into(),
            output_format: ExportFormat::default(),
            fields,
            container: None,
            rate_limit: default_rate_limit(),
            retry_policy: RetryPolicy::default(),
            proxies: Vec::new(),
            pagination: None,
            incremental: false,
            rendering: None,
            scrape_images: false,
            download_images: false,
            image_selector: default_image_selector(),
            inter_request_delay_secs: default_inter_request_delay(),
            login: None,
            user_agents: None,
        }
    }

    /// Minimal config for an item-mode job.
    pub fn with_container(url: impl Into<String>, container: ContainerSpec) -> Self {
        let mut config = Self::new(url, Vec::new());
        config.container = Some(container);
        config
    }

    /// True when extracting repeating items rather than page-level fields.
    pub fn is_item_mode(&self) -> bool {
        self.container.is_some()
    }

    /// Every field spec the job will run, regardless of mode.
    pub fn all_fields(&self) -> &[FieldSpec] {
        match &self.container {
            Some(c) => &c.fields,
            None => &self.fields,
        }
    }

    /// Reject impossible configurations before the job enters `Initializing`.
    ///
    /// This is the only error class reported synchronously to the submitter.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.url.trim().is_empty() {
            return Err(AppError::InvalidConfig("missing required field: url".into()));
        }
        let parsed = Url::parse(&self.url)
            .map_err(|e| AppError::InvalidConfig(format!("invalid url '{}': {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::InvalidConfig(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }

        match (&self.container, self.fields.is_empty()) {
            (Some(_), false) => {
                return Err(AppError::InvalidConfig(
                    "fields and container are mutually exclusive".into(),
                ));
            }
            (None, true) => {
                return Err(AppError::InvalidConfig(
                    "at least one field spec is required".into(),
                ));
            }
            _ => {}
        }

        let mut seen = std::collections::HashSet::new();
        for field in self.all_fields() {
            if field.name.trim().is_empty() {
                return Err(AppError::InvalidConfig("field with empty name".into()));
            }
            if field.selector.trim().is_empty() {
                return Err(AppError::InvalidConfig(format!(
                    "field '{}' has an empty selector",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(AppError::InvalidConfig(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }

        if let Some(container) = &self.container
            && container.selector.trim().is_empty()
        {
            return Err(AppError::InvalidConfig(
                "container selector is required for item mode".into(),
            ));
        }

        if let Some(p) = &self.pagination {
            if p.start_page > p.end_page {
                return Err(AppError::InvalidConfig(format!(
                    "pagination startPage {} > endPage {}",
                    p.start_page, p.end_page
                )));
            }
            if p.param_name.trim().is_empty() {
                return Err(AppError::InvalidConfig(
                    "pagination paramName must not be empty".into(),
                ));
            }
        }

        if !(self.rate_limit > 0.0) {
            return Err(AppError::InvalidConfig(format!(
                "rateLimit must be positive, got {}",
                self.rate_limit
            )));
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(AppError::InvalidConfig(
                "retryPolicy.maxAttempts must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_field() -> FieldSpec {
        FieldSpec {
            name: "title".into(),
            selector: "h1".into(),
            dialect: Dialect::Css,
            attribute: None,
            required: false,
        }
    }

    #[test]
    fn minimal_page_mode_config_validates() {
        let config = ScrapeConfig::new("https://example.com", vec![title_field()]);
        assert!(config.validate().is_ok());
        assert!(!config.is_item_mode());
    }

    #[test]
    fn missing_url_is_rejected() {
        let config = ScrapeConfig::new("", vec![title_field()]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig(_)));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let config = ScrapeConfig::new("ftp://example.com", vec![title_field()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn page_mode_without_fields_is_rejected() {
        let config = ScrapeConfig::new("https://example.com", vec![]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least one field"));
    }

    #[test]
    fn fields_and_container_are_mutually_exclusive() {
        let mut config = ScrapeConfig::new("https://example.com", vec![title_field()]);
        config.container = Some(ContainerSpec {
            selector: ".item".into(),
            dialect: Dialect::Css,
            fields: vec![title_field()],
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn duplicate_field_names_are_rejected() {
        let config = ScrapeConfig::new("https://example.com", vec![title_field(), title_field()]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate field name"));
    }

    #[test]
    fn inverted_pagination_range_is_rejected() {
        let mut config = ScrapeConfig::new("https://example.com", vec![title_field()]);
        config.pagination = Some(PaginationSpec {
            mode: PaginationMode::QueryParam,
            param_name: "page".into(),
            start_page: 5,
            end_page: 2,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_json_fields_are_ignored() {
        let raw = r#"{
            "url": "https://example.com",
            "fields": [{"name": "title", "selector": "h1"}],
            "someFutureKnob": true
        }"#;
        let config: ScrapeConfig = serde_json::from_str(raw).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.fields.len(), 1);
        assert_eq!(config.fields[0].dialect, Dialect::Css);
    }

    #[test]
    fn dialect_deserializes_lowercase() {
        let raw = r#"{"name": "t", "selector": "//h1", "dialect": "xpath", "required": true}"#;
        let field: FieldSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(field.dialect, Dialect::Xpath);
        assert!(matches!(field.selector(), Selector::Path("//h1")));
        assert!(field.required);
    }
}
