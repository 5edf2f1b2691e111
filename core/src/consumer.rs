//! Sequential stream consumer bridging the broker into the store and the cache.
//!
//! # State machine
//!
//! ```text
//!            subscribe ok
//! Connecting ───────────► Consuming ──┐ next message
//!     ▲                      │  ▲     │ (handled in order)
//!     │   stream ended       │  └─────┘
//!     └──────────────────────┘
//!
//! any state ── shutdown ──► Stopped
//! ```
//!
//! A failed subscription is logged and retried after the reconnect delay. There is
//! no other exit than the shutdown signal.
//!
//! # Per-message protocol
//!
//! Messages are handled one at a time, in arrival order:
//!
//! 1. Read the next message. A read error is logged and the next read follows
//!    immediately.
//! 2. Decode the payload as JSON. A malformed payload is logged and discarded.
//! 3. Save the order. A store failure is logged and the order is discarded.
//! 4. Put the saved order into the cache.
//!
//! # Delivery guarantee
//!
//! The source has already advanced the group offset when a message reaches step 2.
//! Decode and store failures therefore lose the message permanently and nothing
//! downstream can tell. This is an **at-most-once**, best-effort pipeline.
//!
//! # Example
//!
//! ```ignore
//! let consumer = OrderConsumer::new(source, store, cache.clone())
//!     .with_reconnect_delay(Duration::from_secs(1));
//!
//! tokio::spawn(async move {
//!     consumer.run(async { shutdown_rx.await.ok(); }).await
//! });
//! ```

use crate::cache::OrderCache;
use crate::event_source::{EventStream, OrderEventSource, RawMessage, StreamError};
use crate::order::{Order, OrderUid};
use crate::store::{OrderStore, StoreError};
use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default pause between failed subscription attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Why a single message was not ingested.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Payload is not a valid order.
    #[error("Failed to decode order: {0}")]
    Decode(String),

    /// Order could not be persisted.
    #[error("Failed to save order: {0}")]
    Store(#[from] StoreError),
}

/// Tally of what happened to the messages a consumer has seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Orders saved and cached
    pub processed: u64,
    /// Messages dropped because the payload was malformed
    pub decode_failures: u64,
    /// Orders dropped because the store rejected them
    pub store_failures: u64,
    /// Failed reads from the broker
    pub read_failures: u64,
}

impl IngestReport {
    /// Messages that were received but not ingested.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.decode_failures + self.store_failures
    }
}

enum Phase {
    Connecting,
    Consuming(EventStream),
    Stopped,
}

/// Single-threaded consumer that keeps the store and the cache in step with the
/// event stream.
pub struct OrderConsumer {
    source: Arc<dyn OrderEventSource>,
    store: Arc<dyn OrderStore>,
    cache: OrderCache,
    reconnect_delay: Duration,
}

impl OrderConsumer {
    /// Create a consumer over the given source, store and cache.
    #[must_use]
    pub fn new(
        source: Arc<dyn OrderEventSource>,
        store: Arc<dyn OrderStore>,
        cache: OrderCache,
    ) -> Self {
        Self {
            source,
            store,
            cache,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Set the pause between failed subscription attempts.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Decode, persist and cache one payload.
    ///
    /// The cache is only touched after the store accepted the order.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Decode`] if [`Order::from_json`] rejects the payload
    /// - [`IngestError::Store`] if the store rejected the order
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<OrderUid, IngestError> {
        let order = Order::from_json(payload).map_err(|e| IngestError::Decode(e.to_string()))?;

        self.store.save(&order).await?;

        let order_uid = order.order_uid.clone();
        self.cache.set(order);
        Ok(order_uid)
    }

    /// Consume an already-open stream until it ends.
    pub async fn run_stream(&self, mut stream: EventStream) -> IngestReport {
        let mut report = IngestReport::default();
        while let Some(next) = stream.next().await {
            self.dispatch(next, &mut report).await;
        }
        report
    }

    /// Run the connect/consume loop until `shutdown` completes.
    ///
    /// Shutdown is observed between messages; a message that is being handled is
    /// finished first.
    pub async fn run<F>(&self, shutdown: F) -> IngestReport
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut report = IngestReport::default();
        let mut phase = Phase::Connecting;

        loop {
            phase = match phase {
                Phase::Connecting => self.connect(&mut shutdown).await,
                Phase::Consuming(stream) => {
                    self.consume_next(stream, &mut shutdown, &mut report).await
                }
                Phase::Stopped => break,
            };
        }

        tracing::info!(
            processed = report.processed,
            dropped = report.dropped(),
            read_failures = report.read_failures,
            "Order consumer stopped"
        );
        report
    }

    async fn connect<F>(&self, shutdown: &mut Pin<&mut F>) -> Phase
    where
        F: Future<Output = ()> + Send,
    {
        let subscribed = tokio::select! {
            () = shutdown.as_mut() => return Phase::Stopped,
            result = self.source.subscribe() => result,
        };

        match subscribed {
            Ok(stream) => {
                tracing::info!("Order consumer subscribed");
                Phase::Consuming(stream)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    retry_in_ms = u64::try_from(self.reconnect_delay.as_millis()).unwrap_or(u64::MAX),
                    "Order consumer failed to subscribe"
                );
                tokio::select! {
                    () = shutdown.as_mut() => Phase::Stopped,
                    () = tokio::time::sleep(self.reconnect_delay) => Phase::Connecting,
                }
            }
        }
    }

    async fn consume_next<F>(
        &self,
        mut stream: EventStream,
        shutdown: &mut Pin<&mut F>,
        report: &mut IngestReport,
    ) -> Phase
    where
        F: Future<Output = ()> + Send,
    {
        let next = tokio::select! {
            biased;
            () = shutdown.as_mut() => return Phase::Stopped,
            next = stream.next() => next,
        };

        match next {
            Some(next) => {
                self.dispatch(next, report).await;
                Phase::Consuming(stream)
            }
            None => {
                tracing::warn!("Order stream ended, reconnecting");
                Phase::Connecting
            }
        }
    }

    async fn dispatch(
        &self,
        next: Result<RawMessage, StreamError>,
        report: &mut IngestReport,
    ) {
        match next {
            Ok(message) => self.process(&message, report).await,
            Err(e) => {
                report.read_failures += 1;
                metrics::counter!("orders.ingest_failed", "reason" => "read").increment(1);
                tracing::warn!(error = %e, "Error reading order message");
            }
        }
    }

    async fn process(&self, message: &RawMessage, report: &mut IngestReport) {
        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            bytes = message.payload.len(),
            "Received order message"
        );

        match self.handle_payload(&message.payload).await {
            Ok(order_uid) => {
                report.processed += 1;
                metrics::counter!("orders.ingested").increment(1);
                tracing::info!(order_uid = %order_uid, "Order saved");
            }
            Err(IngestError::Decode(reason)) => {
                report.decode_failures += 1;
                metrics::counter!("orders.ingest_failed", "reason" => "decode").increment(1);
                tracing::warn!(
                    partition = message.partition,
                    offset = message.offset,
                    error = %reason,
                    "Discarding malformed order message"
                );
            }
            Err(IngestError::Store(e)) => {
                report.store_failures += 1;
                metrics::counter!("orders.ingest_failed", "reason" => "store").increment(1);
                tracing::error!(
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to save order, message dropped"
                );
            }
        }
    }
}
