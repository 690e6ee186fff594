//! JWKS (JSON Web Key Set) fetching and caching
//!
//! - **TTL-based caching**: default 10 minutes
//! - **Refresh on unknown key id**: handles signing key rotation
//! - **Rate limiting**: at most one forced refresh every 5 seconds
//! - **Failure memo**: a failed fetch is reported again, without another
//!   request, until the refresh interval has passed
//! - **Single flight**: concurrent cache misses wait on one fetch
//!
//! Only `https://` endpoints are accepted, plus plain HTTP on
//! `localhost`/`127.0.0.1` for local deployments and tests.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use jsonwebtoken::jwk::JwkSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::KeyResolveError;

/// Default cache TTL
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(600);
/// Default minimum interval between forced refreshes
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    cached_at: SystemTime,
    ttl: Duration,
}

impl CachedJwks {
    fn is_valid(&self) -> bool {
        match SystemTime::now().duration_since(self.cached_at) {
            Ok(age) => age < self.ttl,
            Err(_) => false, // Clock went backwards
        }
    }
}

/// Whether a JWKS endpoint may be fetched
pub fn is_allowed_jwks_uri(uri: &str) -> bool {
    if uri.starts_with("https://") {
        return true;
    }
    let Some(rest) = uri.strip_prefix("http://") else {
        return false;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.rsplit_once(':').map_or(host, |(h, _)| h);
    matches!(host, "localhost" | "127.0.0.1")
}

/// Client for one JWKS endpoint with a shared, TTL-bounded cache.
///
/// Cloning is cheap and clones share the cache.
#[derive(Debug, Clone)]
pub struct JwksClient {
    jwks_uri: String,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    http_client: reqwest::Client,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    /// Time of the last fetch attempt, successful or not
    last_refresh: Arc<RwLock<Option<SystemTime>>>,
    /// Error of the last fetch attempt, cleared by a successful one
    last_error: Arc<RwLock<Option<KeyResolveError>>>,
    fetch_lock: Arc<Mutex<()>>,
}

impl JwksClient {
    /// Create a client with the default TTL and refresh interval.
    ///
    /// # Errors
    ///
    /// [`KeyResolveError::Unavailable`] if the URI is not an allowed
    /// endpoint or the HTTP client cannot be built.
    pub fn new(jwks_uri: impl Into<String>) -> Result<Self, KeyResolveError> {
        let jwks_uri = jwks_uri.into();
        if !is_allowed_jwks_uri(&jwks_uri) {
            return Err(KeyResolveError::Unavailable(format!(
                "JWKS endpoint must use HTTPS (HTTP only allowed for localhost): {jwks_uri}"
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| KeyResolveError::Unavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            jwks_uri,
            cache: Arc::new(RwLock::new(None)),
            http_client,
            cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            last_refresh: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
            fetch_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Set the cache TTL
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Set the minimum interval between forced refreshes
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Get the key set, from cache while it is fresh.
    ///
    /// # Errors
    ///
    /// [`KeyResolveError::Unavailable`] if the endpoint cannot be reached,
    /// answers with an error status, or returns something other than a JWK
    /// set. A failure is repeated without a new request until the minimum
    /// refresh interval has passed.
    pub async fn get_jwks(&self) -> Result<JwkSet, KeyResolveError> {
        if let Some(jwks) = self.cached(true).await {
            debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
            return Ok(jwks);
        }

        let _fetching = self.fetch_lock.lock().await;
        // Another caller may have fetched while we waited
        if let Some(jwks) = self.cached(true).await {
            return Ok(jwks);
        }
        if let Some(err) = self.recent_failure().await {
            debug!(jwks_uri = %self.jwks_uri, error = %err, "JWKS endpoint failed recently");
            return Err(err);
        }
        self.fetch_and_cache().await
    }

    /// Fetch the key set ignoring the cache, unless the last fetch attempt
    /// was less than the minimum refresh interval ago.
    ///
    /// # Errors
    ///
    /// Same as [`JwksClient::get_jwks`].
    pub async fn refresh(&self) -> Result<JwkSet, KeyResolveError> {
        let _fetching = self.fetch_lock.lock().await;

        if self.attempted_within_interval().await {
            warn!(jwks_uri = %self.jwks_uri, "JWKS refresh rate limited");
            if let Some(err) = self.recent_failure().await {
                return Err(err);
            }
            if let Some(jwks) = self.cached(false).await {
                return Ok(jwks);
            }
        }

        self.fetch_and_cache().await
    }

    /// Drop the cached key set
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
        debug!(jwks_uri = %self.jwks_uri, "JWKS cache cleared");
    }

    /// Cached key set; with `fresh_only`, only while within its TTL
    async fn cached(&self, fresh_only: bool) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| !fresh_only || cached.is_valid())
            .map(|cached| cached.jwks.clone())
    }

    async fn attempted_within_interval(&self) -> bool {
        let last_refresh = *self.last_refresh.read().await;
        last_refresh
            .and_then(|last| SystemTime::now().duration_since(last).ok())
            .is_some_and(|since_last| since_last < self.min_refresh_interval)
    }

    async fn recent_failure(&self) -> Option<KeyResolveError> {
        if !self.attempted_within_interval().await {
            return None;
        }
        self.last_error.read().await.clone()
    }

    /// Callers hold `fetch_lock`
    async fn fetch_and_cache(&self) -> Result<JwkSet, KeyResolveError> {
        *self.last_refresh.write().await = Some(SystemTime::now());

        let result = self.fetch().await;
        match &result {
            Ok(jwks) => {
                *self.last_error.write().await = None;
                *self.cache.write().await = Some(CachedJwks {
                    jwks: jwks.clone(),
                    cached_at: SystemTime::now(),
                    ttl: self.cache_ttl,
                });
            }
            Err(err) => *self.last_error.write().await = Some(err.clone()),
        }
        result
    }

    async fn fetch(&self) -> Result<JwkSet, KeyResolveError> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                KeyResolveError::Unavailable(format!("JWKS fetch failed: {e}"))
            })?;

        if !response.status().is_success() {
            error!(
                jwks_uri = %self.jwks_uri,
                status = %response.status(),
                "JWKS endpoint returned error status"
            );
            return Err(KeyResolveError::Unavailable(format!(
                "JWKS endpoint returned status {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            KeyResolveError::Unavailable(format!("Invalid JWKS format: {e}"))
        })?;

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.keys.len(),
            "Fetched JWKS"
        );
        Ok(jwks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_uris() {
        assert!(is_allowed_jwks_uri("https://auth.example.com/jwks.json"));
        assert!(is_allowed_jwks_uri("http://localhost/jwks"));
        assert!(is_allowed_jwks_uri("http://localhost:8080/jwks"));
        assert!(is_allowed_jwks_uri("http://127.0.0.1:49152/jwks"));
        assert!(!is_allowed_jwks_uri("http://auth.example.com/jwks"));
        assert!(!is_allowed_jwks_uri("http://localhost.evil.com/jwks"));
        assert!(!is_allowed_jwks_uri("ftp://localhost/jwks"));
    }

    #[test]
    fn test_rejects_plain_http_remote() {
        let err = JwksClient::new("http://auth.example.com/jwks").unwrap_err();
        assert!(matches!(err, KeyResolveError::Unavailable(_)));
    }

    #[test]
    fn test_builder_settings() {
        let client = JwksClient::new("https://auth.example.com/jwks")
            .unwrap()
            .with_ttl(Duration::from_secs(60));
        assert_eq!(client.cache_ttl(), Duration::from_secs(60));
        assert_eq!(client.jwks_uri(), "https://auth.example.com/jwks");
    }
}
