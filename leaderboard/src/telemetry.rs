// Copyright (c) 2024 Botho Foundation

//! Log output and optional span export.
//!
//! Logs go to stderr through a `fmt` layer filtered by `RUST_LOG`, or by
//! `--verbose` when `RUST_LOG` is unset. Setting `[telemetry] enabled = true`
//! also ships spans to an OTLP collector, which is the easiest way to see
//! where a slow `/isOwner` request spent its time.

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{RandomIdGenerator, Sampler, Tracer},
    Resource,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// `[telemetry]` section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Collector address (OTLP over gRPC)
    pub endpoint: String,
    pub service_name: String,
    /// Fraction of traces kept, clamped to 0..=1
    pub sampling_rate: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:4317".to_string(),
            service_name: "leaderboard-gateway".to_string(),
            sampling_rate: 1.0,
        }
    }
}

impl TelemetryConfig {
    fn sampler(&self) -> Sampler {
        match self.sampling_rate {
            rate if rate >= 1.0 => Sampler::AlwaysOn,
            rate if rate <= 0.0 => Sampler::AlwaysOff,
            rate => Sampler::TraceIdRatioBased(rate),
        }
    }

    fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
    }
}

/// Install the global subscriber.
///
/// With export enabled this must run inside a tokio runtime. Hold the
/// returned guard until exit; dropping it flushes buffered spans.
pub fn init_tracing(config: &TelemetryConfig, verbose: bool) -> Result<Option<TelemetryGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(filter);

    let export = if config.enabled {
        Some(tracing_opentelemetry::layer().with_tracer(otlp_tracer(config)?))
    } else {
        None
    };
    let guard = export.is_some().then_some(TelemetryGuard);

    tracing_subscriber::registry()
        .with(console)
        .with(export)
        .init();

    if guard.is_some() {
        tracing::info!(
            endpoint = %config.endpoint,
            service = %config.service_name,
            sampling_rate = config.sampling_rate,
            "Exporting spans over OTLP"
        );
    }

    Ok(guard)
}

fn otlp_tracer(config: &TelemetryConfig) -> Result<Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.endpoint.clone());

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_sampler(config.sampler())
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(config.resource()),
        )
        .install_batch(runtime::Tokio)
        .with_context(|| format!("Failed to start OTLP export to {}", config.endpoint))
}

/// Flushes and shuts down the span exporter when dropped
pub struct TelemetryGuard;

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}
