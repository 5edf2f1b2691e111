//! Scripted in-memory event source.
//!
//! Each call to `subscribe` consumes the next scripted step:
//!
//! - a failure, returned as [`StreamError::Subscribe`]
//! - a batch that stays open after its last message, like a live broker with no
//!   new traffic
//! - a closing batch that ends after its last message, forcing the consumer to
//!   reconnect
//!
//! Once the script is exhausted, subscriptions succeed and never yield.

#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

use futures::StreamExt;
use order_service_core::{EventStream, OrderEventSource, RawMessage, StreamError};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Topic name stamped on scripted messages.
pub const TEST_TOPIC: &str = "orders";

type Messages = Vec<Result<RawMessage, StreamError>>;

#[derive(Debug)]
enum Step {
    Fail(String),
    Open(Messages),
    Closing(Messages),
}

/// [`OrderEventSource`] that replays a fixed script.
#[derive(Debug, Default)]
pub struct InMemoryEventSource {
    script: Mutex<VecDeque<Step>>,
    subscriptions: AtomicUsize,
}

impl InMemoryEventSource {
    /// Create a source with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a subscription that yields `payloads` and then stays open.
    pub fn push_batch<I, P>(&self, payloads: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        self.push_step(Step::Open(to_messages(payloads)));
    }

    /// Queue a subscription that yields `payloads` and then ends.
    pub fn push_closing_batch<I, P>(&self, payloads: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        self.push_step(Step::Closing(to_messages(payloads)));
    }

    /// Queue a subscription that yields the given reads, including read errors,
    /// and then stays open.
    pub fn push_reads(&self, reads: Vec<Result<RawMessage, StreamError>>) {
        self.push_step(Step::Open(reads));
    }

    /// Queue a failed subscription attempt.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.push_step(Step::Fail(reason.into()));
    }

    /// Number of `subscribe` calls so far.
    #[must_use]
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    fn push_step(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }
}

impl OrderEventSource for InMemoryEventSource {
    fn subscribe(&self) -> Pin<Box<dyn Future<Output = Result<EventStream, StreamError>> + Send + '_>> {
        Box::pin(async move {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front();

            let stream: EventStream = match step {
                Some(Step::Fail(reason)) => {
                    return Err(StreamError::Subscribe {
                        topic: TEST_TOPIC.to_string(),
                        reason,
                    });
                }
                Some(Step::Open(messages)) => {
                    Box::pin(futures::stream::iter(messages).chain(futures::stream::pending()))
                }
                Some(Step::Closing(messages)) => Box::pin(futures::stream::iter(messages)),
                None => Box::pin(futures::stream::pending::<Result<RawMessage, StreamError>>()),
            };
            Ok(stream)
        })
    }
}

fn to_messages<I, P>(payloads: I) -> Messages
where
    I: IntoIterator<Item = P>,
    P: Into<Vec<u8>>,
{
    payloads
        .into_iter()
        .zip(0i64..)
        .map(|(payload, offset)| {
            Ok(RawMessage {
                topic: TEST_TOPIC.to_string(),
                partition: 0,
                offset,
                payload: payload.into(),
            })
        })
        .collect()
}
