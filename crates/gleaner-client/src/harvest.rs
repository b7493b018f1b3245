//! Page harvesting: markup in, records and image URLs out.

use std::sync::Arc;

use chrono::Utc;

use gleaner_core::config::ScrapeConfig;
use gleaner_core::error::AppError;
use gleaner_core::job::PageResult;
use gleaner_core::traits::Harvester;

use crate::dom::ParsedPage;
use crate::extract::{collect_images, extract_items, extract_page};

/// [`Harvester`] running the job's field or container specs against each
/// fetched page.
///
/// Parsing and extraction happen inside one synchronous call; the parsed
/// trees never cross an await point.
#[derive(Clone)]
pub struct PageHarvester {
    config: Arc<ScrapeConfig>,
}

impl PageHarvester {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            config: Arc::new(config.clone()),
        }
    }
}

impl Harvester for PageHarvester {
    fn harvest(&self, url: &str, markup: &str) -> Result<PageResult, AppError> {
        let page = ParsedPage::parse(markup);
        let scraped_at = Utc::now();

        let records = match &self.config.container {
            Some(container) => extract_items(&page, container, url, scraped_at)?,
            None => extract_page(&page, &self.config.fields, url, scraped_at)
                .into_iter()
                .collect(),
        };

        let images_found = if self.config.scrape_images {
            collect_images(&page, &self.config.image_selector, url)
        } else {
            Vec::new()
        };

        tracing::info!(
            %url,
            records = records.len(),
            images = images_found.len(),
            "Page harvested"
        );

        Ok(PageResult {
            url: url.to_string(),
            records,
            images_found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_core::config::{ContainerSpec, Dialect, FieldSpec};
    use gleaner_core::testutil::make_test_config;

    const LISTING: &str = r#"<html><body>
        <h1>Catalogue</h1>
        <div class="item"><h2>A</h2><img src="/a.png"></div>
        <div class="item"><h2>B</h2></div>
    </body></html>"#;

    #[test]
    fn item_mode_emits_one_record_per_container() {
        let mut config = make_test_config();
        config.fields = Vec::new();
        config.container = Some(ContainerSpec {
            selector: ".item".into(),
            dialect: Dialect::Css,
            fields: vec![FieldSpec {
                name: "title".into(),
                selector: "h2".into(),
                dialect: Dialect::Css,
                attribute: None,
                required: false,
            }],
        });

        let harvester = PageHarvester::new(&config);
        let page = harvester
            .harvest("https://example.com/list", LISTING)
            .unwrap();

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].get_text("title"), Some("A"));
        assert!(page.images_found.is_empty());
    }

    #[test]
    fn page_mode_emits_one_record_with_list_values() {
        let config = make_test_config();
        let harvester = PageHarvester::new(&config);
        let page = harvester
            .harvest("https://example.com/list", LISTING)
            .unwrap();

        assert_eq!(page.records.len(), 1);
        let titles = page.records[0].get("title").unwrap().as_array().unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0], "Catalogue");
    }

    #[test]
    fn image_scan_respects_the_config_flag() {
        let mut config = make_test_config();
        config.scrape_images = true;

        let harvester = PageHarvester::new(&config);
        let page = harvester
            .harvest("https://example.com/list", LISTING)
            .unwrap();

        assert_eq!(page.images_found, vec!["https://example.com/a.png"]);
    }

    #[test]
    fn bad_container_selector_fails_the_page() {
        let mut config = make_test_config();
        config.fields = Vec::new();
        config.container = Some(ContainerSpec {
            selector: "::!bad".into(),
            dialect: Dialect::Css,
            fields: Vec::new(),
        });

        let harvester = PageHarvester::new(&config);
        let err = harvester
            .harvest("https://example.com/list", LISTING)
            .unwrap_err();
        assert!(matches!(err, AppError::SelectorError(_)));
    }
}
