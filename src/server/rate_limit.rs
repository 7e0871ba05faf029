//! Per-client request throttling.
//!
//! Clients are identified by the socket peer address. Behind a reverse proxy
//! `rate_limit.trust_forwarded_for` switches to the first `X-Forwarded-For`
//! hop. Each address gets `max_requests` per window, and idle addresses are
//! dropped from the keyed store by [`IpRateLimiter::prune`].

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::error::ApiError;
use crate::config::RateLimitConfig;

pub const RATE_LIMIT_MESSAGE: &str =
    "Too many requests from this IP, please try again after some time";

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Keyed GCRA limiter: a burst of `max_requests`, refilled evenly over the window
pub struct IpRateLimiter {
    limiter: KeyedLimiter,
    clock: DefaultClock,
    trust_forwarded_for: bool,
}

impl std::fmt::Debug for IpRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpRateLimiter")
            .field("tracked_clients", &self.limiter.len())
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

impl IpRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(nonzero!(1u32));
        let period = (window / burst.get()).max(Duration::from_millis(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        let clock = DefaultClock::default();
        Self {
            limiter: RateLimiter::dashmap_with_clock(quota, &clock),
            clock,
            trust_forwarded_for: false,
        }
    }

    /// Key on the first `X-Forwarded-For` hop when the header is present
    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_millis(config.window_ms))
            .trusting_forwarded_for(config.trust_forwarded_for)
    }

    /// The address a request is counted against
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
        client_ip(headers, peer, self.trust_forwarded_for)
    }

    /// Forget clients whose quota has fully replenished
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// `Err` carries how long the client has to wait
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.limiter
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

/// The peer address, else loopback
///
/// With `trust_forwarded_for` the first `X-Forwarded-For` hop takes precedence.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> IpAddr {
    let forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
    };

    trust_forwarded_for
        .then(forwarded)
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Prune the limiter's idle clients every `interval` until the runtime stops
pub fn spawn_pruning(
    limiter: Arc<IpRateLimiter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.prune();
            tracing::debug!("Rate limiter tracking {} clients", limiter.tracked_clients());
        }
    })
}

pub async fn limit_requests(
    State(limiter): State<Arc<IpRateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = limiter.client_key(req.headers(), peer);

    match limiter.check(ip) {
        Ok(()) => next.run(req).await,
        Err(wait) => {
            tracing::warn!("Rate limit exceeded for {}", ip);
            let mut response =
                ApiError::operational(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE)
                    .into_response();
            let seconds = wait.as_secs_f64().ceil().max(1.0) as u64;
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}
