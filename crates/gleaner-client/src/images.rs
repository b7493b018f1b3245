//! Inline image downloading.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;
use url::Url;

use gleaner_core::error::AppError;
use gleaner_core::traits::ImageDownloader;

/// Downloads images into a local directory, deriving filenames from the
/// URL path and falling back to a counter-based name when the path has
/// none.
#[derive(Clone)]
pub struct ReqwestImageDownloader {
    client: Client,
    dir: Arc<PathBuf>,
    counter: Arc<AtomicUsize>,
}

impl ReqwestImageDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self {
            client,
            dir: Arc::new(dir.into()),
            counter: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn derive_filename(&self, image_url: &str) -> String {
        let from_path = Url::parse(image_url).ok().and_then(|url| {
            url.path_segments()?
                .next_back()
                .filter(|segment| segment.contains('.') && !segment.is_empty())
                .map(str::to_string)
        });

        match from_path {
            Some(name) => name,
            None => {
                // No usable basename; guess the extension off the URL tail.
                let ext = image_url
                    .rsplit('.')
                    .next()
                    .map(|tail| tail.split('?').next().unwrap_or_default())
                    .filter(|ext| !ext.is_empty() && ext.len() < 5)
                    .unwrap_or("jpg");
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                format!("image_{n}.{ext}")
            }
        }
    }
}

impl ImageDownloader for ReqwestImageDownloader {
    async fn download(&self, url: &str) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&*self.dir).await?;

        let path = self.dir.join(self.derive_filename(url));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read image body: {e}")))?;
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(url = %url, path = %path.display(), "Downloaded image");
        Ok(path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader() -> ReqwestImageDownloader {
        ReqwestImageDownloader::new("images").unwrap()
    }

    #[test]
    fn filename_comes_from_the_url_path() {
        assert_eq!(
            downloader().derive_filename("https://cdn.example.com/photos/cat.png?w=200"),
            "cat.png"
        );
    }

    #[test]
    fn extensionless_paths_fall_back_to_counter_names() {
        let d = downloader();
        assert_eq!(d.derive_filename("https://cdn.example.com/photos/raw"), "image_0.jpg");
        assert_eq!(d.derive_filename("https://cdn.example.com/photos/raw"), "image_1.jpg");
    }

    #[test]
    fn short_url_extensions_are_kept_in_fallback_names() {
        let d = downloader();
        // Path basename has no dot, but the URL tail does.
        assert_eq!(d.derive_filename("https://x/a/img?fmt=png"), "image_0.jpg");
    }
}
