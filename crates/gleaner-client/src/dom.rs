//! Dual-tree parsing and container location.
//!
//! One job may mix selector dialects freely: a CSS container with an
//! XPath field, or the other way round. Each page is therefore parsed
//! twice, once into a CSS-queryable tree (`scraper`) and once into a
//! path-queryable tree (`skyscraper`), and containers are located as
//! index-aligned pairs: `containers[i].css` and `containers[i].path`
//! denote the same DOM element for every `i` in range.
//!
//! Exact translation between dialects is not generally feasible. For the
//! simple shapes that actually appear in container selectors (tag,
//! `.class`, `#id`, `tag.class`) we translate; anything else degrades to
//! a shorter or padded cross-dialect list; extraction then falls back to
//! empty values for that view instead of crashing. The translated list is
//! always truncated/padded to the native-dialect list's length.

use scraper::{ElementRef, Html};
use skyscraper::html::{DocumentNode, HtmlDocument};
use skyscraper::xpath;

use gleaner_core::config::Selector;
use gleaner_core::error::AppError;

/// Two structurally independent parses of the same markup.
pub struct ParsedPage {
    css: Html,
    path: Option<HtmlDocument>,
}

impl ParsedPage {
    /// Parse markup into both tree views.
    ///
    /// The CSS parse is infallible; a path-view parse failure disables
    /// xpath queries for this page rather than failing it.
    pub fn parse(markup: &str) -> Self {
        let css = Html::parse_document(markup);
        let path = match skyscraper::html::parse(markup) {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::warn!(error = %e, "Path-view parse failed; xpath queries disabled for this page");
                None
            }
        };
        Self { css, path }
    }

    pub fn css(&self) -> &Html {
        &self.css
    }

    pub fn path(&self) -> Option<&HtmlDocument> {
        self.path.as_ref()
    }
}

/// One located container in both tree views; either side may be absent
/// when cross-dialect translation came up short.
#[derive(Clone, Copy, Debug)]
pub struct ContainerHandle<'a> {
    pub css: Option<ElementRef<'a>>,
    pub path: Option<DocumentNode>,
}

/// Locate containers per the spec's selector, index-aligned across views.
///
/// The list length always equals the native-dialect match count; the
/// other view is truncated or padded to fit.
pub fn locate_containers<'a>(
    page: &'a ParsedPage,
    selector: Selector<'_>,
) -> Result<Vec<ContainerHandle<'a>>, AppError> {
    match selector {
        Selector::Css(css_sel) => {
            let compiled = scraper::Selector::parse(css_sel)
                .map_err(|e| AppError::SelectorError(format!("bad css '{css_sel}': {e}")))?;
            let css_list: Vec<ElementRef<'a>> = page.css.select(&compiled).collect();

            let path_list = match (css_to_xpath(css_sel), page.path()) {
                (Some(xpath_sel), Some(document)) => {
                    locate_path_nodes(document, &xpath_sel).unwrap_or_default()
                }
                _ => Vec::new(),
            };

            Ok(align(css_list.len(), |i| ContainerHandle {
                css: Some(css_list[i]),
                path: path_list.get(i).copied(),
            }))
        }
        Selector::Path(path_sel) => {
            let Some(document) = page.path() else {
                tracing::warn!(selector = %path_sel, "No path view; xpath container list is empty");
                return Ok(Vec::new());
            };
            let path_list = locate_path_nodes(document, path_sel)
                .map_err(|e| AppError::SelectorError(format!("bad xpath '{path_sel}': {e}")))?;

            let css_list: Vec<ElementRef<'a>> = match xpath_to_css(path_sel) {
                Some(css_sel) => match scraper::Selector::parse(&css_sel) {
                    Ok(compiled) => page.css.select(&compiled).collect(),
                    Err(_) => Vec::new(),
                },
                None => {
                    tracing::debug!(
                        selector = %path_sel,
                        "No css translation; css-dialect fields in these containers yield empty values"
                    );
                    Vec::new()
                }
            };

            Ok(align(path_list.len(), |i| ContainerHandle {
                css: css_list.get(i).copied(),
                path: Some(path_list[i]),
            }))
        }
    }
}

fn align<'a>(
    len: usize,
    mut make: impl FnMut(usize) -> ContainerHandle<'a>,
) -> Vec<ContainerHandle<'a>> {
    (0..len).map(|i| make(i)).collect()
}

/// Evaluate an xpath expression from the document root.
pub fn locate_path_nodes(
    document: &HtmlDocument,
    expression: &str,
) -> Result<Vec<DocumentNode>, AppError> {
    let expr = xpath::parse(expression)
        .map_err(|e| AppError::SelectorError(format!("xpath parse '{expression}': {e}")))?;
    expr.apply(document)
        .map_err(|e| AppError::SelectorError(format!("xpath apply '{expression}': {e}")))
}

/// Evaluate an xpath expression scoped to one node.
///
/// The engine applies expressions relative to the given node, so the
/// lxml-style `.` anchor from a field spec is stripped and bare tag
/// expressions are rooted at `//` before evaluation.
pub fn locate_path_nodes_in(
    document: &HtmlDocument,
    node: DocumentNode,
    expression: &str,
) -> Result<Vec<DocumentNode>, AppError> {
    let scoped = normalize_relative_xpath(expression);
    let expr = xpath::parse(&scoped)
        .map_err(|e| AppError::SelectorError(format!("xpath parse '{scoped}': {e}")))?;
    expr.apply_to_node(document, node)
        .map_err(|e| AppError::SelectorError(format!("xpath apply '{scoped}': {e}")))
}

fn normalize_relative_xpath(expression: &str) -> String {
    if let Some(rest) = expression.strip_prefix('.') {
        if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("//{rest}")
        }
    } else if expression.starts_with('/') {
        expression.to_string()
    } else {
        format!("//{expression}")
    }
}

/// Best-effort CSS → XPath translation for container alignment.
///
/// Handles `tag`, `.class`, `#id`, and `tag.class`; anything richer
/// (combinators, attribute selectors) returns `None` and the path view
/// goes unaligned. Class translation matches on attribute equality, so a
/// multi-valued `class` attribute does not line up — a documented
/// precision loss of the cross-dialect approximation.
pub fn css_to_xpath(selector: &str) -> Option<String> {
    let s = selector.trim();
    if s.is_empty() || s.contains([' ', '>', '+', '~', '[', ':', ',']) {
        return None;
    }
    if let Some(class) = s.strip_prefix('.') {
        if is_ident(class) {
            return Some(format!("//*[@class='{class}']"));
        }
        return None;
    }
    if let Some(id) = s.strip_prefix('#') {
        if is_ident(id) {
            return Some(format!("//*[@id='{id}']"));
        }
        return None;
    }
    if let Some((tag, class)) = s.split_once('.') {
        if is_ident(tag) && is_ident(class) {
            return Some(format!("//{tag}[@class='{class}']"));
        }
        return None;
    }
    if is_ident(s) {
        return Some(format!("//{s}"));
    }
    None
}

/// Best-effort XPath → CSS translation for container alignment.
///
/// Handles `//tag`, `//*[@id='x']`, `//*[contains(@class, 'x')]`,
/// `//tag[@class='x']`, and `//tag[contains(@class, 'x')]`.
pub fn xpath_to_css(expression: &str) -> Option<String> {
    let rest = expression.trim().strip_prefix("//")?;

    // Plain tag: //div
    if is_ident(rest) {
        return Some(rest.to_string());
    }

    let (tag, predicate) = rest.split_once('[')?;
    let predicate = predicate.strip_suffix(']')?;
    let tag_css = match tag {
        "*" => String::new(),
        t if is_ident(t) => t.to_string(),
        _ => return None,
    };

    // [@id='x'] / [@class='x']
    if let Some(value) = predicate.strip_prefix("@id=").and_then(single_quoted) {
        return Some(format!("{tag_css}#{value}"));
    }
    if let Some(value) = predicate.strip_prefix("@class=").and_then(single_quoted) {
        return Some(format!("{tag_css}.{value}"));
    }

    // [contains(@class, 'x')]
    if let Some(args) = predicate
        .strip_prefix("contains(")
        .and_then(|p| p.strip_suffix(')'))
    {
        let (attr, value) = args.split_once(',')?;
        if attr.trim() == "@class" {
            let value = single_quoted(value.trim())?;
            return Some(format!("{tag_css}.{value}"));
        }
    }
    None
}

fn single_quoted(s: &str) -> Option<&str> {
    s.strip_prefix('\'')?.strip_suffix('\'')
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
