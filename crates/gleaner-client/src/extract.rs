//! Field and container extraction against the dual tree views.

use chrono::{DateTime, Utc};
use scraper::ElementRef;
use url::Url;

use gleaner_core::config::{ContainerSpec, FieldSpec, Selector};
use gleaner_core::error::AppError;
use gleaner_core::record::Record;

use crate::dom::{ContainerHandle, ParsedPage, locate_containers, locate_path_nodes,
    locate_path_nodes_in};

/// Attributes whose values are URL references needing resolution.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "data-src"];

/// Resolve one field inside a located container.
///
/// First match wins: its attribute value if the spec names one, its
/// trimmed text otherwise; empty string when nothing matches. A selector
/// evaluation failure logs and yields an empty string, unless the field
/// is required, in which case the error propagates and the caller
/// discards the record.
pub fn extract_field_in_container(
    page: &ParsedPage,
    container: &ContainerHandle<'_>,
    field: &FieldSpec,
    base_url: &str,
) -> Result<String, AppError> {
    let evaluated = match field.selector() {
        Selector::Css(css_sel) => container
            .css
            .map(|scope| first_css_value(scope, css_sel, field.attribute.as_deref()))
            .unwrap_or(Ok(String::new())),
        Selector::Path(path_sel) => match (page.path(), container.path) {
            (Some(document), Some(node)) => {
                locate_path_nodes_in(document, node, path_sel).map(|nodes| {
                    nodes
                        .first()
                        .map(|n| path_node_value(document, *n, field.attribute.as_deref()))
                        .unwrap_or_default()
                })
            }
            _ => Ok(String::new()),
        },
    };

    let value = handle_eval_error(evaluated, field)?;
    Ok(maybe_resolve(value, field, base_url))
}

/// Resolve one field against the whole page, returning every match.
pub fn extract_field_on_page(
    page: &ParsedPage,
    field: &FieldSpec,
    base_url: &str,
) -> Result<Vec<String>, AppError> {
    let evaluated = evaluate_on_page(page, field.selector(), field.attribute.as_deref());
    let values = handle_eval_error(evaluated, field)?;
    Ok(values
        .into_iter()
        .map(|value| maybe_resolve(value, field, base_url))
        .collect())
}

/// Selector evaluation errors default the field, unless it is required.
fn handle_eval_error<T: Default>(
    evaluated: Result<T, AppError>,
    field: &FieldSpec,
) -> Result<T, AppError> {
    match evaluated {
        Ok(value) => Ok(value),
        Err(e) if field.required => {
            tracing::warn!(field = %field.name, error = %e, "Required field failed");
            Err(AppError::RequiredFieldMissing(field.name.clone()))
        }
        Err(e) => {
            tracing::warn!(field = %field.name, error = %e, "Field extraction failed");
            Ok(T::default())
        }
    }
}

/// Resolve URL-bearing attribute values against the page URL.
fn maybe_resolve(value: String, field: &FieldSpec, base_url: &str) -> String {
    let is_url_attribute = field
        .attribute
        .as_deref()
        .is_some_and(|a| URL_ATTRIBUTES.contains(&a));
    if is_url_attribute && !value.is_empty() {
        resolve_reference(&value, base_url)
    } else {
        value
    }
}

fn first_css_value(
    scope: ElementRef<'_>,
    selector: &str,
    attribute: Option<&str>,
) -> Result<String, AppError> {
    let compiled = scraper::Selector::parse(selector)
        .map_err(|e| AppError::SelectorError(format!("bad css '{selector}': {e}")))?;
    Ok(scope
        .select(&compiled)
        .next()
        .map(|element| element_value(element, attribute))
        .unwrap_or_default())
}

/// Evaluate a selector against the whole page in its native dialect.
///
/// Shared by page-mode extraction and the interactive probe; errors carry
/// the underlying selector diagnostics.
pub(crate) fn evaluate_on_page(
    page: &ParsedPage,
    selector: Selector<'_>,
    attribute: Option<&str>,
) -> Result<Vec<String>, AppError> {
    match selector {
        Selector::Css(css_sel) => all_css_values(page, css_sel, attribute),
        Selector::Path(path_sel) => match page.path() {
            Some(document) => locate_path_nodes(document, path_sel).map(|nodes| {
                nodes
                    .iter()
                    .map(|n| path_node_value(document, *n, attribute))
                    .collect()
            }),
            None => Ok(Vec::new()),
        },
    }
}

fn all_css_values(
    page: &ParsedPage,
    selector: &str,
    attribute: Option<&str>,
) -> Result<Vec<String>, AppError> {
    let compiled = scraper::Selector::parse(selector)
        .map_err(|e| AppError::SelectorError(format!("bad css '{selector}': {e}")))?;
    Ok(page
        .css()
        .select(&compiled)
        .map(|element| element_value(element, attribute))
        .collect())
}

fn element_value(element: ElementRef<'_>, attribute: Option<&str>) -> String {
    match attribute {
        Some(attr) => element.value().attr(attr).unwrap_or_default().to_string(),
        None => element.text().collect::<String>().trim().to_string(),
    }
}

fn path_node_value(
    document: &skyscraper::html::HtmlDocument,
    node: skyscraper::html::DocumentNode,
    attribute: Option<&str>,
) -> String {
    match attribute {
        Some(attr) => node
            .get_attributes(document)
            .and_then(|attrs| attrs.get(attr).cloned())
            .unwrap_or_default(),
        None => node
            .get_text(document)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Resolve a relative reference against the page URL.
pub(crate) fn resolve_reference(value: &str, base_url: &str) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        return value.to_string();
    }
    match Url::parse(base_url).and_then(|base| base.join(value)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => value.to_string(),
    }
}

/// Locate all item containers and extract one record per container.
///
/// Record layout: `item_index` (1-based), `url`, `scraped_at`, then the
/// user's fields in spec order. Each field reads from the tree view
/// matching its own dialect, which may differ from the container's. A
/// required-field failure discards that record only; the rest of the
/// page's items survive.
pub fn extract_items(
    page: &ParsedPage,
    spec: &ContainerSpec,
    page_url: &str,
    scraped_at: DateTime<Utc>,
) -> Result<Vec<Record>, AppError> {
    let containers = locate_containers(page, spec.selector())?;
    tracing::debug!(count = containers.len(), "Located item containers");

    let mut records = Vec::with_capacity(containers.len());
    'containers: for (idx, container) in containers.iter().enumerate() {
        let mut record = Record::new();
        record.insert_number("item_index", (idx + 1) as u64);
        record.insert_text("url", page_url);
        record.insert_text("scraped_at", scraped_at.to_rfc3339());

        for field in &spec.fields {
            match extract_field_in_container(page, container, field, page_url) {
                Ok(value) => record.insert_text(&field.name, value),
                Err(AppError::RequiredFieldMissing(name)) => {
                    tracing::warn!(item = idx + 1, field = %name, "Discarding item");
                    continue 'containers;
                }
                Err(other) => return Err(other),
            }
        }

        record.clean();
        records.push(record);
    }

    Ok(records)
}

/// Page-mode extraction: one record for the whole page, every field
/// list-valued with all its matches.
///
/// Returns `None` when a required field fails; the page then contributes
/// no record.
pub fn extract_page(
    page: &ParsedPage,
    fields: &[FieldSpec],
    page_url: &str,
    scraped_at: DateTime<Utc>,
) -> Option<Record> {
    let mut record = Record::with_builtins(page_url, scraped_at);

    for field in fields {
        match extract_field_on_page(page, field, page_url) {
            Ok(values) => record.insert_list(&field.name, values),
            Err(e) => {
                tracing::warn!(field = %field.name, error = %e, "Discarding page record");
                return None;
            }
        }
    }

    record.clean();
    Some(record)
}

/// Collect image URLs matching the selector, resolved absolute.
///
/// Checks `src`, then the common lazy-loading attributes.
pub fn collect_images(page: &ParsedPage, image_selector: &str, base_url: &str) -> Vec<String> {
    let compiled = match scraper::Selector::parse(image_selector) {
        Ok(compiled) => compiled,
        Err(e) => {
            tracing::warn!(selector = %image_selector, error = %e, "Bad image selector");
            return Vec::new();
        }
    };

    page.css()
        .select(&compiled)
        .filter_map(|img| {
            let element = img.value();
            element
                .attr("src")
                .or_else(|| element.attr("data-src"))
                .or_else(|| element.attr("data-lazy-src"))
        })
        .filter(|src| !src.is_empty())
        .map(|src| resolve_reference(src, base_url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_core::config::Dialect;

    const PRODUCTS: &str = r#"<html><body>
        <div class="item">
            <h2> First   Product </h2>
            <a href="/p/1">view</a>
            <img src="/img/1.jpg">
        </div>
        <div class="item">
            <h2>Second Product</h2>
            <a href="https://cdn.example.com/p/2">view</a>
            <img data-src="/img/2.jpg">
        </div>
        <div class="item">
            <h2>Third Product</h2>
            <a href="/p/3">view</a>
        </div>
    </body></html>"#;

    const BASE: &str = "https://shop.example.com/list";

    fn css_field(name: &str, selector: &str) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            selector: selector.into(),
            dialect: Dialect::Css,
            attribute: None,
            required: false,
        }
    }

    fn link_field() -> FieldSpec {
        FieldSpec {
            name: "link".into(),
            selector: "a".into(),
            dialect: Dialect::Css,
            attribute: Some("href".into()),
            required: false,
        }
    }

    fn container_spec(fields: Vec<FieldSpec>) -> ContainerSpec {
        ContainerSpec {
            selector: ".item".into(),
            dialect: Dialect::Css,
            fields,
        }
    }

    #[test]
    fn three_containers_yield_three_records_with_absolute_links() {
        let page = ParsedPage::parse(PRODUCTS);
        let spec = container_spec(vec![css_field("title", "h2"), link_field()]);
        let records = extract_items(&page, &spec, BASE, Utc::now()).unwrap();

        assert_eq!(records.len(), 3);
        for record in &records {
            assert!(!record.get_text("title").unwrap().is_empty());
            assert!(record.get_text("link").unwrap().starts_with("https://"));
        }
        assert_eq!(records[0].get_text("link"), Some("https://shop.example.com/p/1"));
        assert_eq!(
            records[1].get_text("link"),
            Some("https://cdn.example.com/p/2")
        );
        assert_eq!(records[0].get("item_index").unwrap().as_u64(), Some(1));
        assert_eq!(records[2].get("item_index").unwrap().as_u64(), Some(3));
    }

    #[test]
    fn extracted_text_is_whitespace_normalized() {
        let page = ParsedPage::parse(PRODUCTS);
        let spec = container_spec(vec![css_field("title", "h2")]);
        let records = extract_items(&page, &spec, BASE, Utc::now()).unwrap();
        assert_eq!(records[0].get_text("title"), Some("First Product"));
    }

    #[test]
    fn field_values_never_leak_across_containers() {
        let page = ParsedPage::parse(PRODUCTS);
        let spec = container_spec(vec![css_field("title", "h2")]);
        let records = extract_items(&page, &spec, BASE, Utc::now()).unwrap();
        let titles: Vec<_> = records
            .iter()
            .map(|r| r.get_text("title").unwrap())
            .collect();
        assert_eq!(titles, vec!["First Product", "Second Product", "Third Product"]);
    }

    #[test]
    fn mixed_dialect_field_reads_its_own_container_only() {
        let page = ParsedPage::parse(PRODUCTS);
        if page.path().is_none() {
            return;
        }
        let spec = container_spec(vec![FieldSpec {
            name: "title".into(),
            selector: ".//h2".into(),
            dialect: Dialect::Xpath,
            attribute: None,
            required: false,
        }]);
        let records = extract_items(&page, &spec, BASE, Utc::now()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].get_text("title"), Some("Second Product"));
    }

    #[test]
    fn missing_optional_field_yields_empty_string() {
        let page = ParsedPage::parse(PRODUCTS);
        let spec = container_spec(vec![css_field("price", ".price")]);
        let records = extract_items(&page, &spec, BASE, Utc::now()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get_text("price"), Some(""));
    }

    #[test]
    fn required_field_evaluation_error_discards_only_that_record_shape() {
        let page = ParsedPage::parse(PRODUCTS);
        // An unparsable selector fails evaluation for every container, so
        // every record is discarded, but the call itself succeeds.
        let spec = container_spec(vec![FieldSpec {
            name: "broken".into(),
            selector: "::!bad".into(),
            dialect: Dialect::Css,
            attribute: None,
            required: true,
        }]);
        let records = extract_items(&page, &spec, BASE, Utc::now()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn optional_field_evaluation_error_keeps_the_record() {
        let page = ParsedPage::parse(PRODUCTS);
        let spec = container_spec(vec![
            css_field("title", "h2"),
            FieldSpec {
                name: "broken".into(),
                selector: "::!bad".into(),
                dialect: Dialect::Css,
                attribute: None,
                required: false,
            },
        ]);
        let records = extract_items(&page, &spec, BASE, Utc::now()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get_text("broken"), Some(""));
    }

    #[test]
    fn page_mode_collects_every_match_per_field() {
        let page = ParsedPage::parse(PRODUCTS);
        let record = extract_page(
            &page,
            &[css_field("titles", "h2"), link_field()],
            BASE,
            Utc::now(),
        )
        .unwrap();

        let titles = record.get("titles").unwrap().as_array().unwrap();
        assert_eq!(titles.len(), 3);
        let links = record.get("link").unwrap().as_array().unwrap();
        assert_eq!(links[0], "https://shop.example.com/p/1");
    }

    #[test]
    fn page_mode_required_failure_drops_the_page_record() {
        let page = ParsedPage::parse(PRODUCTS);
        let record = extract_page(
            &page,
            &[FieldSpec {
                name: "broken".into(),
                selector: "::!bad".into(),
                dialect: Dialect::Css,
                attribute: None,
                required: true,
            }],
            BASE,
            Utc::now(),
        );
        assert!(record.is_none());
    }

    #[test]
    fn images_resolve_src_and_lazy_attributes() {
        let page = ParsedPage::parse(PRODUCTS);
        let images = collect_images(&page, "img", BASE);
        assert_eq!(
            images,
            vec![
                "https://shop.example.com/img/1.jpg",
                "https://shop.example.com/img/2.jpg",
            ]
        );
    }
}
