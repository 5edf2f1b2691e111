//! Redpanda/Kafka order event source.
//!
//! [`RedpandaOrderSource`] implements [`OrderEventSource`] with rdkafka's
//! [`StreamConsumer`]. Each subscription creates a fresh consumer in the
//! configured group, subscribes to the order topic and yields raw payloads in
//! partition order.
//!
//! # Delivery semantics
//!
//! **At-most-once** with manual offset commits:
//! - the offset of every message is committed as soon as it is received, before
//!   the payload is handed to the caller
//! - a message whose processing later fails is never redelivered
//! - automatic commits are disabled so the commit point is exactly the point of
//!   receipt
//!
//! A failed commit is logged and consumption continues; the message may then be
//! seen again after a restart.
//!
//! # Example
//!
//! ```no_run
//! use order_service_redpanda::RedpandaOrderSource;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = RedpandaOrderSource::builder()
//!     .brokers("localhost:9092")
//!     .topic("orders")
//!     .consumer_group("order-service")
//!     .auto_offset_reset("earliest")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use futures::StreamExt;
use order_service_core::{EventStream, OrderEventSource, RawMessage, StreamError};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default topic carrying order payloads.
pub const DEFAULT_TOPIC: &str = "orders";

/// Default consumer group.
pub const DEFAULT_CONSUMER_GROUP: &str = "order-service";

/// Redpanda order event source.
///
/// Holds configuration only; the consumer is created on each
/// [`subscribe`](OrderEventSource::subscribe) call and owned by the returned
/// stream, so dropping the stream leaves the group.
#[derive(Clone, Debug)]
pub struct RedpandaOrderSource {
    brokers: String,
    topic: String,
    consumer_group: String,
    auto_offset_reset: String,
    session_timeout: Duration,
}

impl RedpandaOrderSource {
    /// Create a source for the default topic and group.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Subscribe`] if `brokers` is empty.
    pub fn new(brokers: &str) -> Result<Self, StreamError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a builder.
    #[must_use]
    pub fn builder() -> RedpandaOrderSourceBuilder {
        RedpandaOrderSourceBuilder::default()
    }

    /// Configured broker addresses.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Configured topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Configured consumer group.
    #[must_use]
    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    fn create_consumer(&self) -> Result<StreamConsumer, StreamError> {
        let session_timeout_ms = self.session_timeout.as_millis().to_string();
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", &session_timeout_ms)
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| self.subscribe_error(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| self.subscribe_error(format!("Failed to subscribe to topic: {e}")))?;

        Ok(consumer)
    }

    fn subscribe_error(&self, reason: String) -> StreamError {
        StreamError::Subscribe {
            topic: self.topic.clone(),
            reason,
        }
    }
}

/// Builder for [`RedpandaOrderSource`].
///
/// # Example
///
/// ```no_run
/// use order_service_redpanda::RedpandaOrderSource;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = RedpandaOrderSource::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .session_timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RedpandaOrderSourceBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    consumer_group: Option<String>,
    auto_offset_reset: Option<String>,
    session_timeout: Option<Duration>,
}

impl RedpandaOrderSourceBuilder {
    /// Set the broker addresses.
    ///
    /// # Parameters
    ///
    /// - `brokers`: Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic (default: `orders`).
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the consumer group (default: `order-service`).
    ///
    /// Instances sharing a group split the topic's partitions between them.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set where a group without committed offsets starts reading.
    ///
    /// - `"earliest"` (default): from the beginning of each partition
    /// - `"latest"`: only messages produced after subscribing
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the group session timeout (default: 6 seconds).
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Build the source.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Subscribe`] if no brokers were configured.
    pub fn build(self) -> Result<RedpandaOrderSource, StreamError> {
        let topic = self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let brokers = self
            .brokers
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| StreamError::Subscribe {
                topic: topic.clone(),
                reason: "Brokers not configured".to_string(),
            })?;

        let source = RedpandaOrderSource {
            brokers,
            topic,
            consumer_group: self
                .consumer_group
                .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string()),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "earliest".to_string()),
            session_timeout: self.session_timeout.unwrap_or(Duration::from_secs(6)),
        };

        tracing::info!(
            brokers = %source.brokers,
            topic = %source.topic,
            consumer_group = %source.consumer_group,
            auto_offset_reset = %source.auto_offset_reset,
            "RedpandaOrderSource created"
        );

        Ok(source)
    }
}

impl OrderEventSource for RedpandaOrderSource {
    fn subscribe(&self) -> Pin<Box<dyn Future<Output = Result<EventStream, StreamError>> + Send + '_>> {
        Box::pin(async move {
            let consumer = self.create_consumer()?;

            tracing::info!(
                topic = %self.topic,
                consumer_group = %self.consumer_group,
                manual_commit = true,
                "Subscribed to order topic"
            );

            let stream = async_stream::stream! {
                let mut messages = consumer.stream();

                while let Some(next) = messages.next().await {
                    match next {
                        Ok(message) => {
                            // Commit on receipt: the offset moves before the payload is processed
                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Failed to commit offset (message may be redelivered)"
                                );
                            }

                            yield Ok(RawMessage {
                                topic: message.topic().to_string(),
                                partition: message.partition(),
                                offset: message.offset(),
                                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                            });
                        },
                        Err(e) => {
                            yield Err(StreamError::Read(format!("Failed to receive message: {e}")));
                        },
                    }
                }

                tracing::debug!("Order consumer stream ended");
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}
