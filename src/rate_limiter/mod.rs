/*!
 * # Rate Limiting Module
 *
 * Fixed-window request limiting for the storefront API. Keys are the
 * browsing session when the `x-session-id` header is present, the caller
 * IP otherwise, so one hammering visitor cannot starve the rest.
 *
 * Counts live in memory by default; the Redis backend shares one budget
 * across instances and falls back to the in-memory store when Redis is
 * unreachable. Responses carry standard `X-RateLimit-*` headers plus the
 * RFC `RateLimit-*` variants.
 */
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, Response, StatusCode},
};
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::metrics::METRICS;

/// Numeric strings are always valid ASCII header values.
fn num_to_header_value<T: ToString>(n: T) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
    pub enable_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
        }
    }
}

#[derive(Clone, Default)]
pub enum RateLimitBackend {
    #[default]
    InMemory,
    Redis {
        client: Arc<redis::Client>,
        namespace: String,
    },
}

#[derive(Clone)]
enum RateLimitStore {
    InMemory {
        entries: Arc<DashMap<String, RateLimitEntry>>,
    },
    Redis {
        client: Arc<redis::Client>,
        namespace: String,
        fallback: Arc<DashMap<String, RateLimitEntry>>,
    },
}

#[derive(Clone)]
pub struct RateLimiter {
    store: RateLimitStore,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, backend: RateLimitBackend) -> Self {
        let store = match backend {
            RateLimitBackend::InMemory => RateLimitStore::InMemory {
                entries: Arc::new(DashMap::new()),
            },
            RateLimitBackend::Redis { client, namespace } => RateLimitStore::Redis {
                client,
                namespace,
                fallback: Arc::new(DashMap::new()),
            },
        };

        Self { store, config }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, RateLimitBackend::InMemory)
    }

    /// Counts one request against `key`. Redis trouble never rejects a
    /// request; the check drops to the in-memory fallback instead.
    pub async fn check_rate_limit(&self, key: &str) -> RateLimitResult {
        match &self.store {
            RateLimitStore::InMemory { entries } => {
                Self::check_in_memory(entries, key, &self.config)
            }
            RateLimitStore::Redis {
                client,
                namespace,
                fallback,
            } => match client.get_async_connection().await {
                Ok(mut conn) => {
                    match Self::check_with_redis(&mut conn, namespace, key, &self.config).await {
                        Ok(result) => result,
                        Err(err) => {
                            warn!("Redis rate limit error, using fallback: {}", err);
                            Self::check_in_memory(fallback, key, &self.config)
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        "Failed to connect to Redis for rate limiting, using fallback: {}",
                        err
                    );
                    Self::check_in_memory(fallback, key, &self.config)
                }
            },
        }
    }

    fn check_in_memory(
        entries: &DashMap<String, RateLimitEntry>,
        key: &str,
        config: &RateLimitConfig,
    ) -> RateLimitResult {
        let now = Instant::now();
        let mut entry = entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= config.window_duration {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count += 1;

        let allowed = entry.count <= config.requests_per_window;
        let remaining = config.requests_per_window.saturating_sub(entry.count);
        let reset_time = config
            .window_duration
            .saturating_sub(now.duration_since(entry.window_start));

        RateLimitResult {
            allowed,
            limit: config.requests_per_window,
            remaining,
            reset_time,
        }
    }

    async fn check_with_redis<C>(
        conn: &mut C,
        namespace: &str,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, redis::RedisError>
    where
        C: redis::aio::ConnectionLike + Send,
    {
        let redis_key = format!("{}:{}", namespace, key);
        let window_secs = config.window_duration.as_secs().max(1);

        let count: i64 = conn.incr(&redis_key, 1).await?;
        if count == 1 {
            let _: Result<(), _> = conn.expire(&redis_key, window_secs as usize).await;
        } else {
            // A crashed EXPIRE would leave the key immortal; re-arm it
            let ttl: i64 = conn.ttl(&redis_key).await.unwrap_or(-1);
            if ttl < 0 {
                let _: Result<(), _> = conn.expire(&redis_key, window_secs as usize).await;
            }
        }

        let ttl_secs = match conn.ttl::<_, i64>(&redis_key).await {
            Ok(ttl) if ttl > 0 => ttl as u64,
            _ => window_secs,
        };
        let allowed = count <= config.requests_per_window as i64;
        let remaining = config
            .requests_per_window
            .saturating_sub(count.max(0) as u32);

        Ok(RateLimitResult {
            allowed,
            limit: config.requests_per_window,
            remaining,
            reset_time: Duration::from_secs(ttl_secs),
        })
    }

    /// Quota left for a key without consuming any of it. Used by tests
    /// and ops tooling.
    pub fn remaining_quota(&self, key: &str) -> u32 {
        let entries = match &self.store {
            RateLimitStore::InMemory { entries } => entries,
            RateLimitStore::Redis { fallback, .. } => fallback,
        };
        match entries.get(key) {
            Some(entry)
                if Instant::now().duration_since(entry.window_start)
                    < self.config.window_duration =>
            {
                self.config.requests_per_window.saturating_sub(entry.count)
            }
            _ => self.config.requests_per_window,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: Duration,
}

// Key extraction

/// Per-browser key from the session header carts already require.
fn extract_session_key(request: &Request) -> Option<String> {
    request
        .headers()
        .get(crate::auth::SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|session| format!("session:{}", session.trim()))
}

fn extract_ip_key(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                return format!("ip:{}", ip.trim());
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return format!("ip:{}", ip_str);
        }
    }

    "ip:unknown".to_string()
}

fn apply_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    let _ = headers.insert("X-RateLimit-Limit", num_to_header_value(result.limit));
    let _ = headers.insert("X-RateLimit-Remaining", num_to_header_value(result.remaining));
    let _ = headers.insert(
        "X-RateLimit-Reset",
        num_to_header_value(result.reset_time.as_secs()),
    );
    let _ = headers.insert("RateLimit-Limit", num_to_header_value(result.limit));
    let _ = headers.insert("RateLimit-Remaining", num_to_header_value(result.remaining));
    let _ = headers.insert(
        "RateLimit-Reset",
        num_to_header_value(result.reset_time.as_secs()),
    );
}

// Layer implementation for tower
#[derive(Clone)]
pub struct RateLimitLayer {
    rate_limiter: RateLimiter,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig, backend: RateLimitBackend) -> Self {
        Self {
            rate_limiter: RateLimiter::new(config, backend),
        }
    }
}

impl<S> tower::Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    rate_limiter: RateLimiter,
}

impl<S> tower::Service<Request> for RateLimitService<S>
where
    S: tower::Service<Request, Response = Response<axum::body::Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<axum::body::Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let rate_limiter = self.rate_limiter.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Probes and docs stay reachable no matter what
            let path = request.uri().path();
            if path.starts_with("/health")
                || path.starts_with("/metrics")
                || path.starts_with("/swagger-ui")
                || path.starts_with("/api-docs")
            {
                return inner.call(request).await;
            }

            let key = extract_session_key(&request).unwrap_or_else(|| extract_ip_key(&request));
            let result = rate_limiter.check_rate_limit(&key).await;

            if !result.allowed {
                warn!("Rate limit exceeded for key: {}", key);
                METRICS.counter("rate_limit_denied_total").inc();

                let mut response = Response::new(axum::body::Body::from("Rate limit exceeded"));
                *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                if rate_limiter.config.enable_headers {
                    apply_limit_headers(response.headers_mut(), &result);
                }
                return Ok(response);
            }

            let mut response = inner.call(request).await?;
            if rate_limiter.config.enable_headers {
                apply_limit_headers(response.headers_mut(), &result);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn config(limit: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_window: limit,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
        }
    }

    // ==================== Limiter Tests ====================

    #[tokio::test]
    async fn counts_requests_within_one_window() {
        let limiter = RateLimiter::in_memory(config(2));

        assert!(limiter.check_rate_limit("session:a").await.allowed);
        assert!(limiter.check_rate_limit("session:a").await.allowed);
        assert!(!limiter.check_rate_limit("session:a").await.allowed);
    }

    #[tokio::test]
    async fn keys_have_separate_budgets() {
        let limiter = RateLimiter::in_memory(config(1));

        assert!(limiter.check_rate_limit("session:a").await.allowed);
        assert!(limiter.check_rate_limit("session:b").await.allowed);
        assert!(!limiter.check_rate_limit("session:a").await.allowed);
        assert!(!limiter.check_rate_limit("session:b").await.allowed);
    }

    #[tokio::test]
    async fn quota_reflects_consumed_requests() {
        let limiter = RateLimiter::in_memory(config(5));

        assert_eq!(limiter.remaining_quota("session:a"), 5);
        limiter.check_rate_limit("session:a").await;
        assert_eq!(limiter.remaining_quota("session:a"), 4);
    }

    #[tokio::test]
    async fn window_expiry_restores_the_budget() {
        let limiter = RateLimiter::in_memory(RateLimitConfig {
            requests_per_window: 1,
            window_duration: Duration::from_millis(40),
            enable_headers: true,
        });

        assert!(limiter.check_rate_limit("session:a").await.allowed);
        assert!(!limiter.check_rate_limit("session:a").await.allowed);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.check_rate_limit("session:a").await.allowed);
    }

    // ==================== Layer Tests ====================

    fn test_app(limit: u32) -> Router {
        Router::new()
            .route("/api/v1/cart", get(|| async { "ok" }))
            .route("/health", get(|| async { "ok" }))
            .layer(RateLimitLayer::new(config(limit), RateLimitBackend::InMemory))
    }

    async fn hit(app: &Router, path: &str, session: &str) -> Response<Body> {
        let request = axum::http::Request::builder()
            .uri(path)
            .header("x-session-id", session)
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn responses_carry_rate_limit_headers() {
        let app = test_app(2);

        let response = hit(&app, "/api/v1/cart", "sess-1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("X-RateLimit-Limit").unwrap(),
            &num_to_header_value(2)
        );
        assert_eq!(
            response.headers().get("X-RateLimit-Remaining").unwrap(),
            &num_to_header_value(1)
        );
    }

    #[tokio::test]
    async fn over_limit_requests_get_429() {
        let app = test_app(1);

        assert_eq!(hit(&app, "/api/v1/cart", "sess-1").await.status(), StatusCode::OK);
        let denied = hit(&app, "/api/v1/cart", "sess-1").await;
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            denied.headers().get("X-RateLimit-Remaining").unwrap(),
            &num_to_header_value(0)
        );
    }

    #[tokio::test]
    async fn sessions_are_limited_independently() {
        let app = test_app(1);

        assert_eq!(hit(&app, "/api/v1/cart", "sess-1").await.status(), StatusCode::OK);
        assert_eq!(hit(&app, "/api/v1/cart", "sess-2").await.status(), StatusCode::OK);
        assert_eq!(
            hit(&app, "/api/v1/cart", "sess-1").await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn health_probes_bypass_the_limiter() {
        let app = test_app(1);

        for _ in 0..3 {
            assert_eq!(hit(&app, "/health", "sess-1").await.status(), StatusCode::OK);
        }
    }
}
