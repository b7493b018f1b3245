//! The job-facing content fetcher: rendering, rate limiting, retries,
//! and proxy rotation composed over a plain transport.

use tokio_util::sync::CancellationToken;

use gleaner_core::config::{LoginSpec, ScrapeConfig};
use gleaner_core::error::AppError;
use gleaner_core::proxy::ProxyRotator;
use gleaner_core::retry::RetryExecutor;
use gleaner_core::throttle::RateLimiter;
use gleaner_core::traits::{Authenticator, Fetcher};

use crate::http::ProxiedFetch;
use crate::render::{NoRender, Render};

/// Retrieves raw page markup, either via the rendering backend or plain
/// HTTP.
///
/// The plain path runs rate-limit wait → proxy selection → GET inside the
/// retry loop, so limiter and rotator cursors advance on every attempt,
/// failed ones included. A renderer error logs a warning and falls
/// through to the plain path rather than failing the fetch.
#[derive(Clone)]
pub struct ContentFetcher<T, R = NoRender>
where
    T: ProxiedFetch,
    R: Render + Clone,
{
    transport: T,
    renderer: Option<R>,
    limiter: RateLimiter,
    rotator: ProxyRotator,
    retry: RetryExecutor,
}

impl<T: ProxiedFetch> ContentFetcher<T, NoRender> {
    /// Fetcher for one job, shaped by its config; no rendering backend.
    pub fn new(transport: T, config: &ScrapeConfig, cancel: CancellationToken) -> Self {
        Self {
            transport,
            renderer: None,
            limiter: RateLimiter::new(config.rate_limit),
            rotator: ProxyRotator::new(config.proxies.clone()),
            retry: RetryExecutor::new(&config.retry_policy, cancel),
        }
    }
}

impl<T, R> ContentFetcher<T, R>
where
    T: ProxiedFetch,
    R: Render + Clone,
{
    /// Attach a rendering backend decided at construction time.
    pub fn with_renderer<R2: Render + Clone>(self, renderer: R2) -> ContentFetcher<T, R2> {
        ContentFetcher {
            transport: self.transport,
            renderer: Some(renderer),
            limiter: self.limiter,
            rotator: self.rotator,
            retry: self.retry,
        }
    }

    pub fn rotator(&self) -> &ProxyRotator {
        &self.rotator
    }

    async fn fetch_plain(&self, url: &str) -> Result<String, AppError> {
        self.retry
            .execute(|| async {
                self.limiter.wait().await;
                let proxy = self.rotator.next();
                let result = self.transport.fetch_via(url, proxy.as_deref()).await;
                if let Some(proxy) = &proxy {
                    match &result {
                        Ok(_) => self.rotator.mark_success(proxy),
                        Err(_) => self.rotator.mark_failure(proxy),
                    }
                }
                result
            })
            .await
    }
}

impl<T, R> Fetcher for ContentFetcher<T, R>
where
    T: ProxiedFetch,
    R: Render + Clone,
{
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        if let Some(renderer) = &self.renderer {
            match renderer.render(url).await {
                Ok(markup) => return Ok(markup),
                Err(e) => {
                    tracing::warn!(%url, error = %e, "Render failed, falling back to plain fetch");
                }
            }
        }
        self.fetch_plain(url).await
    }
}

impl<T, R> Authenticator for ContentFetcher<T, R>
where
    T: ProxiedFetch + Authenticator,
    R: Render + Clone,
{
    async fn login(&self, spec: &LoginSpec) -> Result<bool, AppError> {
        self.transport.login(spec).await
    }
}
