//! # Order Service Core
//!
//! Domain types and contracts for the order cache service.
//!
//! Orders arrive as JSON on a broker topic, are persisted in a relational store
//! and are served to readers from a process-local cache that falls back to the
//! store on a miss.
//!
//! ```text
//!  broker ──► OrderEventSource ──► OrderConsumer ──► OrderStore.save
//!                                        │                 │
//!                                        └──► OrderCache ◄─┘ warm_up (startup)
//!                                                 ▲
//!  HTTP ──► OrderQuery.lookup ────────────────────┘ miss ──► OrderStore.get_by_id
//! ```
//!
//! ## Modules
//!
//! - [`order`]: the order aggregate and its wire format
//! - [`store`]: persistence contract ([`OrderStore`])
//! - [`cache`]: concurrent in-memory cache ([`OrderCache`])
//! - [`event_source`]: inbound stream contract ([`OrderEventSource`])
//! - [`consumer`]: ingest loop ([`OrderConsumer`])
//! - [`query`]: read-through lookup ([`OrderQuery`])
//! - [`config`]: environment-driven settings ([`ServiceConfig`])
//!
//! Backends live in sibling crates: `order-service-postgres` implements
//! [`OrderStore`], `order-service-redpanda` implements [`OrderEventSource`], and
//! `order-service-testing` provides in-memory doubles of both.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod consumer;
pub mod event_source;
pub mod order;
pub mod query;
pub mod store;

pub use cache::OrderCache;
pub use config::{ConfigError, DatabaseConfig, ServiceConfig, StreamConfig};
pub use consumer::{IngestError, IngestReport, OrderConsumer};
pub use event_source::{EventStream, OrderEventSource, RawMessage, StreamError};
pub use order::{DecodeOrderError, Delivery, Item, Order, OrderUid, Payment};
pub use query::{LookupSource, OrderQuery};
pub use store::{OrderStore, StoreError, StoreFuture};
