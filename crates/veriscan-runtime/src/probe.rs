//! Citation link probing.
//!
//! Each distinct citation URL is probed once per cache lifetime. Probes run
//! concurrently and each one is bounded by the configured fetch timeout.
//!
//! | Probe outcome                     | Status       |
//! |-----------------------------------|--------------|
//! | 2xx or 3xx                        | `live`       |
//! | 401, 403, 429, 451                | `restricted` |
//! | other status, transport error, timeout | `dead`  |

use async_trait::async_trait;
use futures::future::join_all;
use moka::future::Cache;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use veriscan_core::{normalize_url, Citation, LinkStatus};

use crate::config::LinkCacheConfig;

/// Errors from a single link probe.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("Probe transport error: {0}")]
    Transport(String),
}

/// Fetches the HTTP status of a URL.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn status_code(&self, url: &str) -> Result<u16, ProbeError>;

    fn name(&self) -> &str;
}

/// Map an HTTP status code to a link status.
pub fn classify_status(code: u16) -> LinkStatus {
    match code {
        200..=399 => LinkStatus::Live,
        401 | 403 | 429 | 451 => LinkStatus::Restricted,
        _ => LinkStatus::Dead,
    }
}

/// Passive cache of link statuses keyed by normalized URL.
#[derive(Clone)]
pub struct LinkStatusCache {
    cache: Cache<String, LinkStatus>,
}

impl LinkStatusCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &LinkCacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, url: &str) -> Option<LinkStatus> {
        self.cache.get(&normalize_url(url)).await
    }

    pub async fn insert(&self, url: &str, status: LinkStatus) {
        self.cache.insert(normalize_url(url), status).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for LinkStatusCache {
    fn default() -> Self {
        Self::from_config(&LinkCacheConfig::default())
    }
}

/// Probes citation links through a [`LinkProbe`] and a [`LinkStatusCache`].
#[derive(Clone)]
pub struct LinkChecker {
    probe: Arc<dyn LinkProbe>,
    cache: LinkStatusCache,
    fetch_timeout: Duration,
}

impl LinkChecker {
    pub fn new(probe: Arc<dyn LinkProbe>, cache: LinkStatusCache, fetch_timeout: Duration) -> Self {
        Self {
            probe,
            cache,
            fetch_timeout,
        }
    }

    /// Status of one URL, probing only on a cache miss.
    ///
    /// Concurrent callers for the same URL share one probe.
    pub async fn check(&self, url: &str) -> LinkStatus {
        let key = normalize_url(url);
        self.cache
            .cache
            .get_with(key, async {
                let status = match self.probe_once(url).await {
                    Ok(code) => classify_status(code),
                    Err(e) => {
                        debug!(url = %url, error = %e, "Link probe failed");
                        LinkStatus::Dead
                    }
                };
                debug!(url = %url, status = ?status, probe = self.probe.name(), "Link probed");
                status
            })
            .await
    }

    /// Set the status of every citation with a URL.
    pub async fn refresh(&self, citations: &mut [Citation]) {
        let mut distinct: BTreeMap<String, &str> = BTreeMap::new();
        for citation in citations.iter() {
            if !citation.url.is_empty() {
                distinct
                    .entry(normalize_url(&citation.url))
                    .or_insert(citation.url.as_str());
            }
        }

        let urls: Vec<(String, String)> = distinct
            .into_iter()
            .map(|(key, url)| (key, url.to_string()))
            .collect();
        let statuses = join_all(urls.iter().map(|(_, url)| self.check(url))).await;
        let by_key: BTreeMap<&str, LinkStatus> = urls
            .iter()
            .map(|(key, _)| key.as_str())
            .zip(statuses)
            .collect();

        for citation in citations.iter_mut() {
            if let Some(status) = by_key.get(normalize_url(&citation.url).as_str()) {
                citation.status = *status;
            }
        }
    }

    async fn probe_once(&self, url: &str) -> Result<u16, ProbeError> {
        match tokio::time::timeout(self.fetch_timeout, self.probe.status_code(url)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.fetch_timeout)),
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpLinkProbe;

#[cfg(feature = "http")]
mod http {
    use super::*;

    /// Probes links with HEAD requests, falling back to GET when HEAD is refused.
    #[derive(Debug, Clone)]
    pub struct HttpLinkProbe {
        client: reqwest::Client,
    }

    impl HttpLinkProbe {
        pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .map_err(|e| ProbeError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl LinkProbe for HttpLinkProbe {
        async fn status_code(&self, url: &str) -> Result<u16, ProbeError> {
            let head = self
                .client
                .head(url)
                .send()
                .await
                .map_err(|e| ProbeError::Transport(e.to_string()))?;

            if head.status() != reqwest::StatusCode::METHOD_NOT_ALLOWED {
                return Ok(head.status().as_u16());
            }

            let get = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ProbeError::Transport(e.to_string()))?;
            Ok(get.status().as_u16())
        }

        fn name(&self) -> &str {
            "http"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProbe {
        codes: HashMap<String, u16>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl MockProbe {
        fn new(codes: &[(&str, u16)]) -> Self {
            Self {
                codes: codes.iter().map(|(u, c)| (u.to_string(), *c)).collect(),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl LinkProbe for MockProbe {
        async fn status_code(&self, url: &str) -> Result<u16, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.codes
                .get(url)
                .copied()
                .ok_or_else(|| ProbeError::Transport("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn citation(id: usize, url: &str) -> Citation {
        Citation {
            id,
            title: format!("Source {}", id),
            url: url.to_string(),
            snippet: String::new(),
            source_file: None,
            status: LinkStatus::Live,
        }
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), LinkStatus::Live);
        assert_eq!(classify_status(301), LinkStatus::Live);
        assert_eq!(classify_status(403), LinkStatus::Restricted);
        assert_eq!(classify_status(429), LinkStatus::Restricted);
        assert_eq!(classify_status(451), LinkStatus::Restricted);
        assert_eq!(classify_status(404), LinkStatus::Dead);
        assert_eq!(classify_status(500), LinkStatus::Dead);
    }

    #[tokio::test]
    async fn test_refresh_sets_statuses() {
        let probe = Arc::new(MockProbe::new(&[
            ("https://www.nasa.gov/a", 200),
            ("https://paywall.example.com/b", 403),
            ("https://gone.example.com/c", 404),
        ]));
        let checker = LinkChecker::new(probe, LinkStatusCache::default(), Duration::from_secs(1));

        let mut citations = vec![
            citation(1, "https://www.nasa.gov/a"),
            citation(2, "https://paywall.example.com/b"),
            citation(3, "https://gone.example.com/c"),
            citation(4, "https://unreachable.example.com/d"),
        ];
        checker.refresh(&mut citations).await;

        assert_eq!(citations[0].status, LinkStatus::Live);
        assert_eq!(citations[1].status, LinkStatus::Restricted);
        assert_eq!(citations[2].status, LinkStatus::Dead);
        assert_eq!(citations[3].status, LinkStatus::Dead);
    }

    #[tokio::test]
    async fn test_cache_avoids_second_probe() {
        let probe = Arc::new(MockProbe::new(&[("https://www.nasa.gov/a", 200)]));
        let checker = LinkChecker::new(probe.clone(), LinkStatusCache::default(), Duration::from_secs(1));

        assert_eq!(checker.check("https://www.nasa.gov/a").await, LinkStatus::Live);
        assert_eq!(checker.check("http://nasa.gov/a/").await, LinkStatus::Live);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_urls_probed_once() {
        let probe = Arc::new(MockProbe::new(&[("https://www.nasa.gov/a", 200)]));
        let checker = LinkChecker::new(probe.clone(), LinkStatusCache::default(), Duration::from_secs(1));

        let mut citations = vec![
            citation(1, "https://www.nasa.gov/a"),
            citation(2, "https://nasa.gov/a/"),
        ];
        checker.refresh(&mut citations).await;

        assert!(citations.iter().all(|c| c.status == LinkStatus::Live));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_is_dead() {
        let mut probe = MockProbe::new(&[("https://slow.example.com", 200)]);
        probe.delay = Duration::from_secs(30);
        let checker = LinkChecker::new(Arc::new(probe), LinkStatusCache::default(), Duration::from_secs(10));

        assert_eq!(checker.check("https://slow.example.com").await, LinkStatus::Dead);
    }

    #[tokio::test]
    async fn test_preseeded_cache() {
        let cache = LinkStatusCache::default();
        cache.insert("https://www.snopes.com/x", LinkStatus::Restricted).await;
        assert_eq!(cache.get("snopes.com/x").await, Some(LinkStatus::Restricted));

        let probe = Arc::new(MockProbe::new(&[]));
        let checker = LinkChecker::new(probe.clone(), cache, Duration::from_secs(1));
        assert_eq!(checker.check("https://snopes.com/x").await, LinkStatus::Restricted);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }
}
