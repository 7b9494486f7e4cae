use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    hash::Hash,
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by IP address
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Rate limiter keyed by an arbitrary caller identity (API key id, demo bucket, ...)
pub type KeyedRateLimiter = Arc<RateLimiter<String, DashMapStateStore<String>, DefaultClock>>;

/// State for `ip_rate_limit_middleware`.
#[derive(Clone)]
pub struct IpRateLimit {
    pub limiter: IpRateLimiter,
    /// Take the client IP from `X-Forwarded-For`. Only safe behind a proxy
    /// that overwrites the header.
    pub trust_forwarded_for: bool,
}

/// Quota allowing `attempts` requests per `window_seconds`, replenished evenly.
fn quota(attempts: u32, window_seconds: u64) -> Quota {
    let burst = NonZeroU32::new(attempts.max(1)).unwrap_or(NonZeroU32::MIN);
    let period_ms = (window_seconds.saturating_mul(1000) / u64::from(burst.get())).max(1);

    Quota::with_period(Duration::from_millis(period_ms))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

/// Create a keyed rate limiter (by IP)
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    Arc::new(RateLimiter::dashmap(quota(attempts, window_seconds)))
}

/// Create a rate limiter keyed by caller identity
pub fn create_keyed_rate_limiter(attempts: u32, window_seconds: u64) -> KeyedRateLimiter {
    Arc::new(RateLimiter::dashmap(quota(attempts, window_seconds)))
}

/// Check one request against `limiter` for `key`.
pub fn check_keyed(limiter: &KeyedRateLimiter, key: &str, message: &str) -> Result<(), AppError> {
    limiter.check_key(&key.to_string()).map_err(|negative| {
        let wait_time = negative.wait_time_from(DefaultClock::default().now());
        AppError::TooManyRequests(message.to_string(), Some(wait_time.as_secs().max(1)))
    })
}

/// Drop buckets that have fully replenished, then release the freed memory.
pub fn prune<K>(limiter: &RateLimiter<K, DashMapStateStore<K>, DefaultClock>)
where
    K: Hash + Eq + Clone,
{
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

/// Prune `limiter` every `every` until it is dropped.
pub fn spawn_pruning<K>(
    limiter: &Arc<RateLimiter<K, DashMapStateStore<K>, DefaultClock>>,
    every: Duration,
) -> tokio::task::JoinHandle<()>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
{
    let weak = Arc::downgrade(limiter);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match weak.upgrade() {
                Some(limiter) => prune(&limiter),
                None => break,
            }
        }
    })
}

/// Client IP: the socket peer, or the first `X-Forwarded-For` hop when
/// `trust_forwarded_for` is set.
pub fn client_ip(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    let forwarded_ip = || {
        request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };
    let peer_ip = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    if trust_forwarded_for {
        forwarded_ip().or_else(peer_ip)
    } else {
        peer_ip()
    }
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(state): State<IpRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match client_ip(&request, state.trust_forwarded_for) {
        Some(ip) => match state.limiter.check_key(&ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                tracing::warn!(client_ip = %ip, "IP rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait_time.as_secs().max(1)),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
