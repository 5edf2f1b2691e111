//! Inbound order event stream abstraction.
//!
//! An [`OrderEventSource`] opens a subscription on a broker topic under a named
//! consumer group and yields raw payloads in per-partition arrival order. The
//! payload bytes are decoded by the consumer, not by the source.
//!
//! # Delivery semantics
//!
//! Sources used with [`OrderConsumer`](crate::consumer::OrderConsumer) advance
//! the consumer group's position as soon as a message is received, before it is
//! processed. A message that fails later (malformed payload, storage failure) is
//! therefore never redelivered: the pipeline is **at-most-once**.
//!
//! # Implementations
//!
//! - `RedpandaOrderSource` (`order-service-redpanda`) - Kafka-compatible brokers
//! - `InMemoryEventSource` (`order-service-testing`) - scripted messages for tests

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised by an event source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Could not create the consumer or subscribe to the topic.
    #[error("Subscription failed for topic '{topic}': {reason}")]
    Subscribe {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Transient failure while reading the next message.
    #[error("Failed to read message: {0}")]
    Read(String),
}

/// A message received from the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    /// Topic the message was read from
    pub topic: String,
    /// Partition within the topic
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Payload bytes (empty when the broker message had none)
    pub payload: Vec<u8>,
}

impl RawMessage {
    /// Create a message with the given payload and no broker coordinates.
    #[must_use]
    pub fn from_payload(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: String::new(),
            partition: 0,
            offset: 0,
            payload: payload.into(),
        }
    }
}

/// Stream of messages from one subscription.
///
/// The stream ending means the connection is gone; the consumer reconnects.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RawMessage, StreamError>> + Send>>;

/// Subscribable source of order events.
pub trait OrderEventSource: Send + Sync {
    /// Open a new subscription.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Subscribe`] if the consumer cannot be created or the
    /// subscription is rejected.
    fn subscribe(&self) -> Pin<Box<dyn Future<Output = Result<EventStream, StreamError>> + Send + '_>>;
}
