use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, State},
    http::{header::RETRY_AFTER, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::background::BackgroundTasks;
use crate::config::Config;
use crate::error::ApiError;

const HEADER_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<RateLimitConfig>,
    buckets: Arc<Mutex<HashMap<BucketKey, BucketState>>>,
}

impl RateLimitState {
    pub fn from_config(config: &Config) -> Self {
        let limits = RateLimitConfig {
            enabled: config.limiter_enabled,
            read_limit: config.limiter_read_per_window,
            write_limit: config.limiter_write_per_window,
            window: config.limiter_window(),
        };

        tracing::info!(
            enabled = limits.enabled,
            read_limit = limits.read_limit,
            write_limit = limits.write_limit,
            window_seconds = limits.window.as_secs(),
            "rate limiter configured"
        );

        Self::new(limits)
    }

    fn new(config: RateLimitConfig) -> Self {
        Self {
            config: Arc::new(config),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn check_request<B>(&self, request: &Request<B>) -> RateLimitDecision {
        let class = BudgetClass::of(request.method());
        let limit = match class {
            BudgetClass::Read => self.config.read_limit,
            BudgetClass::Write => self.config.write_limit,
        };
        let key = BucketKey {
            ip: extract_client_ip(request),
            class,
        };
        let now = Instant::now();

        let mut buckets = self.buckets.lock();

        let bucket = buckets.entry(key).or_insert_with(|| BucketState {
            window_start: now,
            count: 0,
        });

        if now.duration_since(bucket.window_start) >= self.config.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        let remaining_window = self
            .config
            .window
            .saturating_sub(now.duration_since(bucket.window_start));
        let reset_seconds = ceil_duration_to_seconds(remaining_window).max(1);

        if bucket.count >= limit {
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_seconds,
            };
        }

        bucket.count += 1;

        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(bucket.count),
            reset_seconds,
        }
    }

    /// Drop buckets whose window has fully elapsed; returns how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.config.window;
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.window_start) < window);
        before - buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Sweep stale buckets once per window until `shutdown` flips to true
    pub fn spawn_sweeper(&self, tasks: &BackgroundTasks, mut shutdown: watch::Receiver<bool>) {
        let limiter = self.clone();
        tasks.spawn("rate-limit-sweeper", async move {
            let mut ticker = tokio::time::interval(limiter.config.window);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "expired rate limit buckets swept");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

struct RateLimitConfig {
    enabled: bool,
    read_limit: u32,
    write_limit: u32,
    window: Duration,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
enum BudgetClass {
    Read,
    Write,
}

impl BudgetClass {
    fn of(method: &Method) -> Self {
        if is_write_method(method) {
            BudgetClass::Write
        } else {
            BudgetClass::Read
        }
    }
}

#[derive(Hash, Eq, PartialEq)]
struct BucketKey {
    ip: String,
    class: BudgetClass,
}

struct BucketState {
    window_start: Instant,
    count: u32,
}

struct RateLimitDecision {
    allowed: bool,
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !rate_limiter.enabled() {
        return next.run(request).await;
    }

    let decision = rate_limiter.check_request(&request);

    if !decision.allowed {
        let mut response = ApiError::RateLimited.into_response();
        attach_rate_limit_headers(&mut response, &decision);
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(decision.reset_seconds));
        return response;
    }

    let mut response = next.run(request).await;
    attach_rate_limit_headers(&mut response, &decision);
    response
}

fn attach_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert(HEADER_RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(
        HEADER_RATE_LIMIT_REMAINING,
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HEADER_RATE_LIMIT_RESET,
        HeaderValue::from(decision.reset_seconds),
    );
}

fn extract_client_ip<B>(request: &Request<B>) -> String {
    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_x_forwarded_for)
    {
        return ip.to_string();
    }

    if let Some(ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_ip_addr)
    {
        return ip.to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

fn parse_x_forwarded_for(raw: &str) -> Option<IpAddr> {
    raw.split(',').map(str::trim).find_map(parse_ip_addr)
}

fn parse_ip_addr(raw: &str) -> Option<IpAddr> {
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

fn is_write_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn ceil_duration_to_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        middleware,
        routing::{get, patch},
        Router,
    };
    use tower::ServiceExt;

    fn limiter(enabled: bool, read_limit: u32, write_limit: u32, window: Duration) -> RateLimitState {
        RateLimitState::new(RateLimitConfig {
            enabled,
            read_limit,
            write_limit,
            window,
        })
    }

    fn test_app(limiter: RateLimitState) -> Router<()> {
        Router::new()
            .route("/v1/movies", get(|| async { "list" }).post(|| async { "create" }))
            .route("/v1/movies/:id", patch(|| async { "update" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
    }

    fn request(method: &str, uri: &str, ip: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method(method)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn returns_429_envelope_after_read_budget_is_spent() {
        let app = test_app(limiter(true, 3, 1, Duration::from_secs(60)));

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(request("GET", "/v1/movies", "203.0.113.10"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(request("GET", "/v1/movies", "203.0.113.10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(RETRY_AFTER));
        assert_eq!(response.headers()[HEADER_RATE_LIMIT_REMAINING], "0");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "rate limit exceeded");
    }

    #[tokio::test]
    async fn includes_rate_limit_headers_on_success() {
        let app = test_app(limiter(true, 5, 1, Duration::from_secs(60)));

        let response = app
            .oneshot(request("GET", "/v1/movies", "198.51.100.22"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[HEADER_RATE_LIMIT_LIMIT], "5");
        assert_eq!(response.headers()[HEADER_RATE_LIMIT_REMAINING], "4");
        assert!(response.headers().contains_key(HEADER_RATE_LIMIT_RESET));
    }

    #[tokio::test]
    async fn write_budget_is_separate_from_reads() {
        let app = test_app(limiter(true, 3, 1, Duration::from_secs(60)));
        let ip = "203.0.113.33";

        let created = app.clone().oneshot(request("POST", "/v1/movies", ip)).await.unwrap();
        assert_eq!(created.status(), StatusCode::OK);

        let limited = app
            .clone()
            .oneshot(request("PATCH", "/v1/movies/1", ip))
            .await
            .unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

        let read_ok = app.oneshot(request("GET", "/v1/movies", ip)).await.unwrap();
        assert_eq!(read_ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn clients_are_tracked_per_ip() {
        let app = test_app(limiter(true, 1, 1, Duration::from_secs(60)));

        let first = app
            .clone()
            .oneshot(request("GET", "/v1/movies", "192.0.2.1"))
            .await
            .unwrap();
        let other = app
            .oneshot(request("GET", "/v1/movies", "192.0.2.2"))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn disabled_limiter_passes_everything_through() {
        let app = test_app(limiter(false, 1, 1, Duration::from_secs(60)));

        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(request("POST", "/v1/movies", "192.0.2.44"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(!response.headers().contains_key(HEADER_RATE_LIMIT_LIMIT));
        }
    }

    #[tokio::test]
    async fn allows_requests_again_after_window_reset() {
        let app = test_app(limiter(true, 1, 1, Duration::from_millis(200)));

        let first = app
            .clone()
            .oneshot(request("GET", "/v1/movies", "192.0.2.50"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .clone()
            .oneshot(request("GET", "/v1/movies", "192.0.2.50"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        tokio::time::sleep(Duration::from_millis(300)).await;

        let third = app
            .oneshot(request("GET", "/v1/movies", "192.0.2.50"))
            .await
            .unwrap();
        assert_eq!(third.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sweep_drops_only_expired_buckets() {
        let limiter = limiter(true, 5, 5, Duration::from_millis(100));
        limiter.check_request(&request("GET", "/v1/movies", "192.0.2.7"));
        limiter.check_request(&request("POST", "/v1/movies", "192.0.2.7"));
        assert_eq!(limiter.tracked_clients(), 2);
        assert_eq!(limiter.sweep(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(limiter.sweep(), 2);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let limiter = limiter(true, 5, 5, Duration::from_millis(50));
        let tasks = BackgroundTasks::new();
        let (tx, rx) = watch::channel(false);

        limiter.spawn_sweeper(&tasks, rx);
        assert_eq!(tasks.in_flight(), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), tasks.wait())
            .await
            .unwrap();
    }

    #[test]
    fn client_ip_prefers_forwarded_headers() {
        let req = Request::builder()
            .header("x-forwarded-for", "not-an-ip, 203.0.113.9")
            .header("x-real-ip", "198.51.100.1")
            .body(())
            .unwrap();
        assert_eq!(extract_client_ip(&req), "203.0.113.9");

        let req = Request::builder()
            .header("x-real-ip", "198.51.100.1:8080")
            .body(())
            .unwrap();
        assert_eq!(extract_client_ip(&req), "198.51.100.1");

        let req = Request::builder().body(()).unwrap();
        assert_eq!(extract_client_ip(&req), "unknown");
    }
}
