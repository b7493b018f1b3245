//! Plain HTTP transport using reqwest.
//!
//! One [`HttpFetcher`] holds a lazily-built reqwest client per proxy, all
//! sharing a single cookie jar so a login session survives proxy rotation.
//! The User-Agent rotates per request from a built-in browser list (or a
//! configured override).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Proxy, cookie::Jar};

use gleaner_core::config::LoginSpec;
use gleaner_core::error::AppError;
use gleaner_core::traits::{Authenticator, Fetcher};

/// Desktop browser User-Agents rotated across requests.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Transport seam: a GET through an optional outbound proxy.
///
/// Split from [`Fetcher`] so the traffic-shaping layer can pick the proxy
/// per request while tests substitute a mock transport.
pub trait ProxiedFetch: Send + Sync + Clone {
    fn fetch_via(
        &self,
        url: &str,
        proxy: Option<&str>,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// HTTP fetcher with per-proxy clients, shared cookies, and UA rotation.
#[derive(Clone)]
pub struct HttpFetcher {
    timeout: Duration,
    user_agents: Arc<Vec<String>>,
    jar: Arc<Jar>,
    /// Lazily-built client per proxy key ("" = direct).
    clients: Arc<Mutex<HashMap<String, Client>>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agents: Arc::new(USER_AGENTS.iter().map(|s| s.to_string()).collect()),
            jar: Arc::new(Jar::default()),
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the built-in User-Agent rotation list.
    pub fn with_user_agents(mut self, agents: Vec<String>) -> Self {
        if !agents.is_empty() {
            self.user_agents = Arc::new(agents);
        }
        self
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, AppError> {
        let key = proxy.unwrap_or_default().to_string();
        let mut clients = self.clients.lock().unwrap();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .timeout(self.timeout)
            .cookie_provider(Arc::clone(&self.jar))
            .default_headers(default_headers());
        if let Some(proxy_url) = proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| AppError::HttpError(format!("Invalid proxy '{proxy_url}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    fn pick_user_agent(&self) -> &str {
        let idx = (xorshift_seeded() as usize) % self.user_agents.len();
        &self.user_agents[idx]
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxiedFetch for HttpFetcher {
    async fn fetch_via(&self, url: &str, proxy: Option<&str>) -> Result<String, AppError> {
        let client = self.client_for(proxy)?;
        let response = client
            .get(url)
            .header(USER_AGENT, self.pick_user_agent())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.fetch_via(url, None).await
    }
}

impl Authenticator for HttpFetcher {
    /// Form POST to the login URL; only the pass/fail signal matters.
    /// Session cookies land in the shared jar.
    async fn login(&self, spec: &LoginSpec) -> Result<bool, AppError> {
        let client = self.client_for(None)?;
        let response = client
            .post(&spec.login_url)
            .header(USER_AGENT, self.pick_user_agent())
            .form(&[
                ("username", spec.username.as_str()),
                ("password", spec.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(response.status().is_success())
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}

// ---------------------------------------------------------------------------
// Deterministic index source based on std — avoids pulling in the `rand`
// crate. Uses a simple xorshift seeded from the current time.
// ---------------------------------------------------------------------------

fn xorshift_seeded() -> u64 {
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ua_rotation_stays_inside_the_list() {
        let fetcher = HttpFetcher::new();
        for _ in 0..50 {
            let ua = fetcher.pick_user_agent();
            assert!(USER_AGENTS.contains(&ua));
        }
    }

    #[test]
    fn ua_override_replaces_the_list() {
        let fetcher = HttpFetcher::new().with_user_agents(vec!["TestAgent/1.0".into()]);
        assert_eq!(fetcher.pick_user_agent(), "TestAgent/1.0");
    }

    #[test]
    fn empty_ua_override_is_ignored() {
        let fetcher = HttpFetcher::new().with_user_agents(Vec::new());
        assert!(USER_AGENTS.contains(&fetcher.pick_user_agent()));
    }

    #[test]
    fn invalid_proxy_url_is_an_http_error() {
        let fetcher = HttpFetcher::new();
        let err = fetcher.client_for(Some("not a proxy")).unwrap_err();
        assert!(matches!(err, AppError::HttpError(_)));
    }

    #[test]
    fn clients_are_cached_per_proxy() {
        let fetcher = HttpFetcher::new();
        fetcher.client_for(None).unwrap();
        fetcher.client_for(Some("http://proxy:8080")).unwrap();
        fetcher.client_for(None).unwrap();
        assert_eq!(fetcher.clients.lock().unwrap().len(), 2);
    }
}
