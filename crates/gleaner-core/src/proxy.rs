//! Round-robin proxy rotation with per-proxy health tracking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-proxy success/failure counters.
///
/// Score = successes − 2 × failures; failures weigh double so a flaky
/// proxy sinks quickly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyHealth {
    pub successes: u32,
    pub failures: u32,
}

impl ProxyHealth {
    pub fn score(&self) -> i64 {
        i64::from(self.successes) - 2 * i64::from(self.failures)
    }
}

#[derive(Debug, Default)]
struct RotatorInner {
    cursor: usize,
    health: HashMap<String, ProxyHealth>,
}

/// Selects an outbound proxy per request.
///
/// `next()` walks the configured pool round-robin; the cursor advances even
/// when the resulting request fails, so one bad proxy cannot pin the
/// rotation. Health counters feed [`ProxyRotator::healthiest`], an opt-in
/// alternative selection strategy — the orchestrator's default path stays
/// round-robin.
#[derive(Clone)]
pub struct ProxyRotator {
    proxies: Arc<Vec<String>>,
    inner: Arc<Mutex<RotatorInner>>,
}

impl ProxyRotator {
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies: Arc::new(proxies),
            inner: Arc::new(Mutex::new(RotatorInner::default())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Next proxy in rotation; `None` when the pool is empty.
    pub fn next(&self) -> Option<String> {
        if self.proxies.is_empty() {
            return None;
        }
        let mut inner = self.inner.lock().unwrap();
        let proxy = self.proxies[inner.cursor].clone();
        inner.cursor = (inner.cursor + 1) % self.proxies.len();
        Some(proxy)
    }

    pub fn mark_success(&self, proxy: &str) {
        if !self.proxies.iter().any(|p| p == proxy) {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.health.entry(proxy.to_string()).or_default().successes += 1;
    }

    pub fn mark_failure(&self, proxy: &str) {
        if !self.proxies.iter().any(|p| p == proxy) {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.health.entry(proxy.to_string()).or_default().failures += 1;
    }

    pub fn health(&self, proxy: &str) -> ProxyHealth {
        let inner = self.inner.lock().unwrap();
        inner.health.get(proxy).copied().unwrap_or_default()
    }

    /// Proxy with the highest health score; ties broken by pool order.
    pub fn healthiest(&self) -> Option<String> {
        if self.proxies.is_empty() {
            return None;
        }
        let inner = self.inner.lock().unwrap();
        let mut best: Option<(&String, i64)> = None;
        for proxy in self.proxies.iter() {
            let score = inner
                .health
                .get(proxy)
                .copied()
                .unwrap_or_default()
                .score();
            // Strict comparison keeps the first-seen proxy on ties.
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((proxy, score));
            }
        }
        best.map(|(p, _)| p.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ProxyRotator {
        ProxyRotator::new(vec![
            "http://p1:8080".into(),
            "http://p2:8080".into(),
            "http://p3:8080".into(),
        ])
    }

    #[test]
    fn next_walks_the_pool_round_robin() {
        let rotator = pool();
        let picks: Vec<_> = (0..7).map(|_| rotator.next().unwrap()).collect();
        assert_eq!(
            picks,
            vec![
                "http://p1:8080",
                "http://p2:8080",
                "http://p3:8080",
                "http://p1:8080",
                "http://p2:8080",
                "http://p3:8080",
                "http://p1:8080",
            ]
        );
    }

    #[test]
    fn empty_pool_returns_none() {
        let rotator = ProxyRotator::new(vec![]);
        assert_eq!(rotator.next(), None);
        assert_eq!(rotator.healthiest(), None);
    }

    #[test]
    fn healthiest_prefers_highest_score() {
        let rotator = pool();
        for _ in 0..3 {
            rotator.mark_success("http://p1:8080");
        }
        rotator.mark_success("http://p2:8080");
        rotator.mark_failure("http://p2:8080");

        // p1: 3 − 0 = 3, p2: 1 − 2 = −1, p3: 0
        assert_eq!(rotator.healthiest().unwrap(), "http://p1:8080");
        assert_eq!(rotator.health("http://p1:8080").score(), 3);
        assert_eq!(rotator.health("http://p2:8080").score(), -1);
    }

    #[test]
    fn healthiest_breaks_ties_by_pool_order() {
        let rotator = pool();
        assert_eq!(rotator.healthiest().unwrap(), "http://p1:8080");
    }

    #[test]
    fn unknown_proxy_marks_are_ignored() {
        let rotator = pool();
        rotator.mark_success("http://stranger:1");
        assert_eq!(rotator.health("http://stranger:1").score(), 0);
    }
}
