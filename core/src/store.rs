//! Record store abstraction for the order aggregate.
//!
//! The [`OrderStore`] is the single source of truth. Every order enters it through
//! [`OrderStore::save`], which persists the root, the delivery, the payment and all
//! items as one atomic unit.
//!
//! # Persistence semantics
//!
//! - **Root is idempotent**: saving an identifier that already exists is accepted
//!   without error and leaves the existing root fields untouched.
//! - **Children are appended**: delivery, payment and item rows are inserted on
//!   every save. Saving the same order twice yields two delivery rows, two payment
//!   rows and doubled item rows. [`OrderStore::get_by_id`] reflects this: item
//!   counts grow with every re-delivery, while a single delivery and a single
//!   payment are picked from the duplicates.
//! - **All or nothing**: if any insert fails the whole save is rolled back.
//!
//! # Consistency of bulk reads
//!
//! [`OrderStore::get_all`] fixes the set of roots first and then assembles each
//! order with independent reads. Concurrent writes during the scan can produce an
//! order whose children do not match a single point in time. This is acceptable
//! for cache warm-up and must not be relied upon elsewhere.
//!
//! # Implementations
//!
//! - `PostgresOrderStore` (`order-service-postgres`) - production
//! - `InMemoryOrderStore` (`order-service-testing`) - tests
//!
//! The trait returns `Pin<Box<dyn Future>>` so that stores can be shared as
//! `Arc<dyn OrderStore>` between the consumer task and HTTP handlers.

use crate::order::{Order, OrderUid};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors returned by record store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested order has no root row.
    #[error("Order not found: {0}")]
    NotFound(OrderUid),

    /// Query, constraint or serialization failure inside the database.
    #[error("Database error: {0}")]
    Database(String),

    /// Could not reach the database or acquire a connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Applying the schema failed.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StoreError {
    /// Whether this error is a negative lookup rather than a fault.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Boxed future returned by [`OrderStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable, transactional persistence of orders.
pub trait OrderStore: Send + Sync {
    /// Persist an order aggregate atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Connection`] on any
    /// failure. Nothing written by this call is observable afterwards.
    fn save<'a>(&'a self, order: &'a Order) -> StoreFuture<'a, ()>;

    /// Assemble one order from its root, delivery, payment and item rows.
    ///
    /// A missing delivery or payment yields a zero-valued sub-record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if there is no root row for `order_uid`
    /// - [`StoreError::Database`] / [`StoreError::Connection`] on failure
    fn get_by_id<'a>(&'a self, order_uid: &'a OrderUid) -> StoreFuture<'a, Order>;

    /// Assemble every stored order. Not a consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] / [`StoreError::Connection`] on failure.
    fn get_all(&self) -> StoreFuture<'_, Vec<Order>>;
}
