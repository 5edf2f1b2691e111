//! Logging and metrics setup.

use anyhow::Context;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the fmt subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// # Errors
///
/// Fails if the listener cannot be bound or a recorder is already installed.
pub fn install_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    describe_metrics();
    tracing::info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("orders.ingested", "Orders saved and cached by the consumer");
    describe_counter!(
        "orders.ingest_failed",
        "Messages dropped by the consumer, by reason (decode, store, read)"
    );
    describe_counter!("orders.cache_hits", "Lookups answered from the cache");
    describe_counter!("orders.cache_misses", "Lookups that fell back to the store");
    describe_gauge!("orders.cache_size", "Orders currently cached");
    describe_counter!("order_store.errors", "Failed store operations, by operation");
    describe_counter!("http.requests", "Completed HTTP requests, by status");
}
