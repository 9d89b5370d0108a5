//! Login rate limiting.
//!
//! Fixed-window counter per source address: the first request in a window
//! starts it, later requests increment the counter, and anything past the
//! configured maximum is rejected until the window resets. In-memory,
//! best-effort and per-process — this is not a distributed limiter.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::error::{ApiError, ErrorDetails};
use crate::config::RateLimitConfig;
use crate::AppState;

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Thread-safe fixed-window limiter keyed by source IP.
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<IpAddr, WindowEntry>,
    config: RateLimitConfig,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            window: Duration::from_secs(config.window_seconds),
            config,
        }
    }

    /// Record a request from `ip`. Returns Ok(()) if allowed, or
    /// Err(retry_after_seconds) once the window's budget is spent.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        if !self.config.enabled {
            return Ok(());
        }

        let now = Instant::now();
        let mut entry = self.entries.entry(ip).or_insert_with(|| WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 1;
            entry.window_start = now;
            return Ok(());
        }

        entry.count += 1;
        if entry.count > self.config.max_requests {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(entry.window_start))
                .as_secs()
                .max(1);
            Err(retry_after)
        } else {
            Ok(())
        }
    }

    /// Number of tracked source addresses (for monitoring)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Extract client IP from request headers
fn extract_client_ip(request: &Request<Body>) -> IpAddr {
    // Check X-Forwarded-For header first (for reverse proxy setups)
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            // Take the first IP in the list (original client)
            if let Some(ip_str) = value.split(',').next() {
                if let Ok(ip) = ip_str.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    // Check X-Real-IP header
    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }

    // Fallback for direct local connections
    "127.0.0.1".parse().unwrap()
}

/// Middleware applied to the login route only.
pub async fn rate_limit_login(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = extract_client_ip(&request);

    match state.rate_limiter.check(ip) {
        Ok(()) => Ok(next.run(request).await),
        Err(retry_after) => {
            tracing::warn!(%ip, retry_after, "Login rate limit exceeded");
            let mut details = HashMap::new();
            details.insert(
                "retryAfterSeconds".to_string(),
                serde_json::json!(retry_after),
            );
            Err(ApiError::rate_limited("Too many requests")
                .with_details(ErrorDetails::Generic(details)))
        }
    }
}
