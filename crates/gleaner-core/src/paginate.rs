//! Pagination expansion: one base URL into an ordered page sequence.

use url::Url;

use crate::config::{PaginationMode, PaginationSpec};
use crate::error::AppError;

/// Expand `base_url` into the job's ordered URL list.
///
/// Without a spec, the list is just `[base_url]`. With one, the list has
/// `end_page − start_page + 1` entries in page order.
pub fn plan(base_url: &str, spec: Option<&PaginationSpec>) -> Result<Vec<String>, AppError> {
    let Some(spec) = spec else {
        return Ok(vec![base_url.to_string()]);
    };

    let mut urls = Vec::with_capacity(spec.end_page.saturating_sub(spec.start_page) as usize + 1);
    for page in spec.start_page..=spec.end_page {
        let url = match spec.mode {
            PaginationMode::QueryParam => with_page_param(base_url, &spec.param_name, page)?,
            PaginationMode::PathSegment => with_page_segment(base_url, page),
        };
        urls.push(url);
    }
    Ok(urls)
}

/// Set/replace the page query parameter, preserving every other parameter.
fn with_page_param(base_url: &str, param: &str, page: u32) -> Result<String, AppError> {
    let parsed = Url::parse(base_url)
        .map_err(|e| AppError::InvalidConfig(format!("invalid url '{base_url}': {e}")))?;

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = parsed;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(param, &page.to_string());
    }
    Ok(url.to_string())
}

/// Append `/page/{n}` to the path, trailing slash stripped first.
fn with_page_segment(base_url: &str, page: u32) -> String {
    format!("{}/page/{page}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(mode: PaginationMode, start: u32, end: u32) -> PaginationSpec {
        PaginationSpec {
            mode,
            param_name: "page".into(),
            start_page: start,
            end_page: end,
        }
    }

    #[test]
    fn absent_spec_yields_the_base_url() {
        let urls = plan("https://x/a?x=1", None).unwrap();
        assert_eq!(urls, vec!["https://x/a?x=1"]);
    }

    #[test]
    fn query_param_mode_preserves_other_parameters() {
        let urls = plan(
            "https://x/a?x=1",
            Some(&spec(PaginationMode::QueryParam, 1, 3)),
        )
        .unwrap();

        assert_eq!(urls.len(), 3);
        for (i, url) in urls.iter().enumerate() {
            let parsed = Url::parse(url).unwrap();
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            assert!(pairs.contains(&("x".into(), "1".into())), "x=1 lost in {url}");
            assert!(
                pairs.contains(&("page".into(), (i + 1).to_string())),
                "wrong page in {url}"
            );
        }
    }

    #[test]
    fn query_param_mode_replaces_an_existing_page_value() {
        let urls = plan(
            "https://x/a?page=99&x=1",
            Some(&spec(PaginationMode::QueryParam, 2, 2)),
        )
        .unwrap();
        let parsed = Url::parse(&urls[0]).unwrap();
        let pages: Vec<String> = parsed
            .query_pairs()
            .filter(|(k, _)| k == "page")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(pages, vec!["2"]);
    }

    #[test]
    fn path_segment_mode_strips_the_trailing_slash() {
        let urls = plan(
            "https://x/list/",
            Some(&spec(PaginationMode::PathSegment, 1, 2)),
        )
        .unwrap();
        assert_eq!(urls, vec!["https://x/list/page/1", "https://x/list/page/2"]);
    }

    #[test]
    fn single_page_range_yields_one_url() {
        let urls = plan("https://x", Some(&spec(PaginationMode::PathSegment, 4, 4))).unwrap();
        assert_eq!(urls, vec!["https://x/page/4"]);
    }
}
