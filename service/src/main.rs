//! Order cache service.
//!
//! Startup order:
//!
//! 1. tracing, configuration, optional metrics exporter
//! 2. PostgreSQL pool and migrations (fatal on failure)
//! 3. cache warm-up from the store (a failure starts the cache cold)
//! 4. the broker consumer on its own task
//! 5. the HTTP server until Ctrl-C, then the consumer is stopped

mod telemetry;

use anyhow::Context;
use order_service_core::{OrderCache, OrderConsumer, OrderQuery, OrderStore, ServiceConfig};
use order_service_postgres::PostgresOrderStore;
use order_service_redpanda::RedpandaOrderSource;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = ServiceConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        http_addr = %config.http_addr,
        brokers = %config.stream.brokers,
        topic = %config.stream.topic,
        static_dir = %config.static_dir.display(),
        "Starting order service"
    );

    if let Some(addr) = config.metrics_addr {
        telemetry::install_metrics(addr)?;
    }

    let postgres = PostgresOrderStore::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    postgres.migrate().await.context("Failed to apply migrations")?;
    let store: Arc<dyn OrderStore> = Arc::new(postgres);

    let cache = OrderCache::new();
    let warmed = cache.warm_up(store.as_ref()).await;
    tracing::info!(orders = warmed, "Cache ready");

    let source = RedpandaOrderSource::builder()
        .brokers(&config.stream.brokers)
        .topic(&config.stream.topic)
        .consumer_group(&config.stream.consumer_group)
        .auto_offset_reset(&config.stream.auto_offset_reset)
        .build()
        .context("Invalid broker configuration")?;
    let consumer = OrderConsumer::new(Arc::new(source), Arc::clone(&store), cache.clone())
        .with_reconnect_delay(config.stream.reconnect_delay);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let consumer_task = tokio::spawn(async move {
        consumer
            .run(async move {
                stop_rx.changed().await.ok();
            })
            .await
    });

    let app = order_service_web::router(OrderQuery::new(cache, store), &config.static_dir);
    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    stop_tx.send(true).ok();
    match consumer_task.await {
        Ok(report) => tracing::info!(
            processed = report.processed,
            dropped = report.dropped(),
            read_failures = report.read_failures,
            "Consumer stopped"
        ),
        Err(e) => tracing::error!(error = %e, "Consumer task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
