//! Observability for the HTTP gateway
//!
//! ## Metrics Exported
//!
//! - `leaderboard_http_requests_total{route}` - Requests served (counter)
//! - `leaderboard_http_errors_total{route}` - Responses with status >= 400 (counter)
//! - `leaderboard_score_points_total` - Points accepted across all players (counter)
//! - `leaderboard_chain_query_seconds` - Ownership check latency (histogram)
//! - `process_*` - Resident memory, CPU, open fds (from process collector)

use prometheus::{
    process_collector::ProcessCollector, Encoder, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use std::time::Instant;

/// Prometheus metrics for one gateway instance
pub struct GatewayMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub errors_total: IntCounterVec,
    pub score_points_total: IntCounter,
    pub chain_query_seconds: Histogram,
}

impl GatewayMetrics {
    /// Create a new metrics registry with all metrics registered
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("leaderboard_http_requests_total", "Total HTTP requests"),
            &["route"],
        )
        .expect("metric can be created");

        let errors_total = IntCounterVec::new(
            Opts::new("leaderboard_http_errors_total", "Total HTTP error responses"),
            &["route"],
        )
        .expect("metric can be created");

        let score_points_total = IntCounter::with_opts(Opts::new(
            "leaderboard_score_points_total",
            "Score points accepted across all players",
        ))
        .expect("metric can be created");

        let chain_query_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "leaderboard_chain_query_seconds",
                "Latency of NFT ownership checks against the chain node",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .expect("metric can be created");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(score_points_total.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(chain_query_seconds.clone()))
            .expect("collector can be registered");

        // Not available on every platform
        let _ = registry.register(Box::new(ProcessCollector::for_self()));

        Self {
            registry,
            requests_total,
            errors_total,
            score_points_total,
            chain_query_seconds,
        }
    }

    pub fn record_request(&self, route: &str) {
        self.requests_total.with_label_values(&[route]).inc();
    }

    pub fn record_error(&self, route: &str) {
        self.errors_total.with_label_values(&[route]).inc();
    }

    pub fn record_points(&self, amount: u64) {
        self.score_points_total.inc_by(amount);
    }

    pub fn observe_chain_query(&self, started: Instant) {
        self.chain_query_seconds
            .observe(started.elapsed().as_secs_f64());
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Liveness response for `/health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

pub fn check_health(started: Instant) -> HealthResponse {
    HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: started.elapsed().as_secs(),
    }
}
