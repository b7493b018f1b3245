//! Interactive selector probe.
//!
//! One URL, one selector, up to [`PREVIEW_LIMIT`] matches back — used to
//! validate a selector before committing it to a job. A single
//! best-effort fetch: no pagination, no dedup, no retry policy.

use gleaner_core::config::{Dialect, Selector};
use gleaner_core::error::AppError;
use gleaner_core::traits::Fetcher;

use crate::dom::ParsedPage;
use crate::extract::{evaluate_on_page, resolve_reference};

pub const PREVIEW_LIMIT: usize = 10;

/// Matches found by a probe, capped at the preview limit.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub selector: String,
    pub dialect: Dialect,
    pub count: usize,
    pub preview: Vec<String>,
}

/// Fetch `url` once and preview what `selector` matches on it.
///
/// Selector problems surface as errors here — this is the one place where
/// the caller wants the diagnostics, not an empty field.
pub async fn probe_selector<F: Fetcher>(
    fetcher: &F,
    url: &str,
    selector: &str,
    dialect: Dialect,
    attribute: Option<&str>,
) -> Result<ProbeResult, AppError> {
    let markup = fetcher.fetch(url).await?;
    preview_matches(&markup, url, selector, dialect, attribute)
}

/// Evaluate a selector against already-fetched markup.
pub fn preview_matches(
    markup: &str,
    base_url: &str,
    selector: &str,
    dialect: Dialect,
    attribute: Option<&str>,
) -> Result<ProbeResult, AppError> {
    let page = ParsedPage::parse(markup);
    let values = evaluate_on_page(&page, Selector::new(selector, dialect), attribute)?;

    let resolve = attribute.is_some_and(|a| matches!(a, "href" | "src" | "data-src"));
    let preview: Vec<String> = values
        .into_iter()
        .take(PREVIEW_LIMIT)
        .map(|value| {
            if resolve && !value.is_empty() {
                resolve_reference(&value, base_url)
            } else {
                value
            }
        })
        .collect();

    Ok(ProbeResult {
        selector: selector.to_string(),
        dialect,
        count: preview.len(),
        preview,
    })
}
