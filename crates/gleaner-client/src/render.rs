//! Optional browser rendering backend.
//!
//! Rendering is a construction-time capability: the job either gets a
//! working [`BrowserRenderer`] before its loop starts, or it runs plain
//! HTTP for the whole job. There is no mid-run engine probing.

use std::future::Future;

use gleaner_core::config::RenderEngine;
use gleaner_core::error::AppError;

/// Renders a URL to its post-JavaScript DOM serialization.
pub trait Render: Send + Sync {
    fn render(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Placeholder renderer for jobs without a rendering backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRender;

impl Render for NoRender {
    async fn render(&self, _url: &str) -> Result<String, AppError> {
        Err(AppError::RenderError("no rendering backend configured".into()))
    }
}

/// Whether this build can service the requested engine.
pub fn engine_available(engine: RenderEngine) -> bool {
    match engine {
        RenderEngine::Chromium => cfg!(feature = "browser"),
    }
}

#[cfg(feature = "browser")]
pub use self::browser::BrowserRenderer;

#[cfg(feature = "browser")]
mod browser {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;

    use gleaner_core::error::AppError;

    use super::Render;

    /// Headless-browser renderer using Chromium via the Chrome DevTools
    /// Protocol.
    ///
    /// Unlike the plain HTTP path, this executes JavaScript before
    /// returning the markup, making it suitable for SPAs and pages with
    /// lazy-loaded content. A single Chromium process is shared across all
    /// clones; each [`Render::render`] call opens a new tab, grabs the
    /// rendered HTML, and closes the tab. The process is killed when the
    /// last clone drops, so a job releases its renderer on every exit
    /// path.
    #[derive(Clone)]
    pub struct BrowserRenderer {
        browser: Arc<Browser>,
        timeout: Duration,
    }

    impl BrowserRenderer {
        /// Launches headless Chromium with a **30 s** navigation timeout.
        pub async fn launch() -> Result<Self, AppError> {
            Self::launch_with_timeout(Duration::from_secs(30)).await
        }

        /// Launches headless Chromium with a custom navigation timeout.
        pub async fn launch_with_timeout(timeout: Duration) -> Result<Self, AppError> {
            let mut builder = BrowserConfig::builder();
            builder = builder.no_sandbox().disable_default_args();

            // Snap-packaged Chromium exposes a wrapper that rejects
            // standard Chrome CLI flags; try to locate the real binary
            // first, then fall back to chromiumoxide's own lookup.
            if let Some(bin) = Self::find_chrome_binary() {
                tracing::info!("Using Chrome binary: {}", bin.display());
                builder = builder.chrome_executable(bin);
            }

            let config = builder
                .arg("--headless=new")
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg("--disable-extensions")
                .arg("--disable-popup-blocking")
                .arg("--disable-translate")
                .arg("--no-first-run")
                .build()
                .map_err(|e| AppError::RenderError(format!("Browser config error: {e}")))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| AppError::RenderError(format!("Failed to launch browser: {e}")))?;

            // The CDP handler must be polled continuously for the
            // connection to work.
            tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        tracing::warn!("Browser CDP handler error: {event:?}");
                        break;
                    }
                }
            });

            Ok(Self {
                browser: Arc::new(browser),
                timeout,
            })
        }

        /// Tries to locate the real Chrome/Chromium binary, honouring an
        /// explicit `CHROME_BIN` override first.
        fn find_chrome_binary() -> Option<PathBuf> {
            if let Ok(p) = std::env::var("CHROME_BIN") {
                let path = PathBuf::from(&p);
                if path.exists() {
                    return Some(path);
                }
            }

            let candidates: &[&str] = &[
                "/snap/chromium/current/usr/lib/chromium-browser/chrome",
                "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
                "/usr/bin/google-chrome-stable",
                "/usr/bin/google-chrome",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
            ];

            candidates.iter().map(PathBuf::from).find(|p| p.exists())
        }
    }

    impl Render for BrowserRenderer {
        async fn render(&self, url: &str) -> Result<String, AppError> {
            let timeout = self.timeout;

            let result = tokio::time::timeout(timeout, async {
                let page = self.browser.new_page(url).await.map_err(|e| {
                    AppError::RenderError(format!("Failed to navigate to {url}: {e}"))
                })?;

                // A present <body> is the readiness signal; scripts have
                // had their chance to run by the time it resolves.
                page.find_element("body").await.map_err(|e| {
                    AppError::RenderError(format!("Page did not render body: {e}"))
                })?;

                let html = page.content().await.map_err(|e| {
                    AppError::RenderError(format!("Failed to read page content: {e}"))
                })?;

                // One tab per fetch; close it before handing back the DOM.
                let _ = page.close().await;

                Ok::<String, AppError>(html)
            })
            .await;

            match result {
                Ok(inner) => inner,
                Err(_) => Err(AppError::Timeout(timeout.as_secs())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_render_always_errors() {
        let err = NoRender.render("https://example.com").await.unwrap_err();
        assert!(matches!(err, AppError::RenderError(_)));
    }

    #[test]
    fn chromium_availability_tracks_the_feature_flag() {
        assert_eq!(
            engine_available(RenderEngine::Chromium),
            cfg!(feature = "browser")
        );
    }
}
