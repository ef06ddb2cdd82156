//! Per-client rate limiting for the HTTP API.
//!
//! Sliding one-minute window keyed by client IP, with:
//! - Standard HTTP rate limit headers (X-RateLimit-*)
//! - 429 Too Many Requests responses with Retry-After

use parking_lot::Mutex;
use std::{
    collections::HashMap,
    net::IpAddr,
    time::{SystemTime, UNIX_EPOCH},
};

/// Rate limit window in seconds
const WINDOW_SECONDS: u64 = 60;

/// Rate limit information for a request.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Unix timestamp when the window resets
    pub reset: u64,
    /// Whether the request is allowed
    pub allowed: bool,
    /// Seconds until rate limit resets (for Retry-After header)
    pub retry_after: Option<u64>,
}

impl RateLimitInfo {
    fn allowed(limit: u32, remaining: u32, reset: u64) -> Self {
        Self {
            limit,
            remaining,
            reset,
            allowed: true,
            retry_after: None,
        }
    }

    fn limited(limit: u32, reset: u64, retry_after: u64) -> Self {
        Self {
            limit,
            remaining: 0,
            reset,
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// Request timestamps of one client within the current window
#[derive(Default)]
struct ClientWindow {
    requests: Vec<u64>,
}

impl ClientWindow {
    /// Check the limit and record the request if allowed.
    /// Returns (allowed, remaining, oldest_request_in_window).
    fn check_and_record(&mut self, now: u64, limit: u32) -> (bool, u32, Option<u64>) {
        let cutoff = now.saturating_sub(WINDOW_SECONDS);
        self.requests.retain(|&t| t > cutoff);

        let oldest = self.requests.first().copied();

        let current_count = self.requests.len() as u32;
        if current_count >= limit {
            return (false, 0, oldest);
        }

        self.requests.push(now);
        (true, limit.saturating_sub(current_count + 1), oldest)
    }
}

/// Thread-safe rate limiter keyed by client address.
pub struct RateLimiter {
    clients: Mutex<HashMap<IpAddr, ClientWindow>>,
    /// Requests per window; 0 disables limiting
    limit: u32,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            limit,
        }
    }

    /// Limiter that lets everything through
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Check the limit for `client` and record the request if allowed.
    pub fn check(&self, client: IpAddr) -> RateLimitInfo {
        self.check_at(client, current_timestamp())
    }

    fn check_at(&self, client: IpAddr, now: u64) -> RateLimitInfo {
        if !self.is_enabled() {
            return RateLimitInfo::allowed(0, 0, now + WINDOW_SECONDS);
        }

        let (allowed, remaining, oldest) = self
            .clients
            .lock()
            .entry(client)
            .or_default()
            .check_and_record(now, self.limit);

        // Window resets when the oldest request in it expires
        let reset = oldest
            .map(|t| t + WINDOW_SECONDS)
            .unwrap_or(now + WINDOW_SECONDS);

        if allowed {
            RateLimitInfo::allowed(self.limit, remaining, reset)
        } else {
            RateLimitInfo::limited(self.limit, reset, reset.saturating_sub(now))
        }
    }

    /// Drop clients with no request in the last two windows.
    pub fn cleanup(&self) {
        let cutoff = current_timestamp().saturating_sub(WINDOW_SECONDS * 2);
        self.clients
            .lock()
            .retain(|_, window| window.requests.iter().any(|&t| t > cutoff));
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }
}

/// Get current Unix timestamp in seconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
