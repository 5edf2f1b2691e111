//! In-memory order store for fast, deterministic tests.
//!
//! [`InMemoryOrderStore`] reproduces the observable behaviour of the relational
//! store rather than acting as a plain key/value map:
//!
//! - the root record is inserted once; later saves of the same identifier leave
//!   it untouched
//! - delivery, payment and item rows are appended on every save, so re-saving an
//!   order accumulates child rows
//! - a save is validated as a whole before anything is written; one oversized
//!   text field rejects the entire order
//! - lookups assemble the earliest delivery and payment row and every item in
//!   insertion order, with zero values for missing child rows
//!
//! Failure injection and call counters let tests assert how a component used
//! the store.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use order_service_core::{Delivery, Item, Order, OrderStore, OrderUid, Payment, StoreError, StoreFuture};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// Maximum length of any text column.
pub const MAX_TEXT_LEN: usize = 255;

#[derive(Debug, Default)]
struct Tables {
    roots: HashMap<OrderUid, Order>,
    root_order: Vec<OrderUid>,
    deliveries: Vec<(OrderUid, Delivery)>,
    payments: Vec<(OrderUid, Payment)>,
    items: Vec<(OrderUid, Item)>,
}

/// In-memory [`OrderStore`] with relational save semantics.
///
/// # Example
///
/// ```
/// use order_service_core::OrderStore;
/// use order_service_testing::{sample_order, InMemoryOrderStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryOrderStore::new();
/// let order = sample_order();
///
/// store.save(&order).await?;
/// store.save(&order).await?;
///
/// // Root kept once, items appended twice
/// assert_eq!(store.order_count(), 1);
/// assert_eq!(store.get_by_id(&order.order_uid).await?.item_count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    tables: RwLock<Tables>,
    fail_saves: AtomicBool,
    pending_save_failures: AtomicUsize,
    fail_reads: AtomicBool,
    save_calls: AtomicUsize,
    get_calls: AtomicUsize,
    get_all_calls: AtomicUsize,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with a database error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make only the next `count` saves fail with a database error.
    pub fn fail_next_saves(&self, count: usize) {
        self.pending_save_failures.store(count, Ordering::SeqCst);
    }

    /// Make every subsequent `get_by_id` and `get_all` fail with a connection error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of `save` calls, successful or not.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_by_id` calls.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_all` calls.
    #[must_use]
    pub fn get_all_calls(&self) -> usize {
        self.get_all_calls.load(Ordering::SeqCst)
    }

    /// Number of root records.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.tables.read().unwrap().roots.len()
    }

    /// Number of delivery rows stored for `order_uid`.
    #[must_use]
    pub fn delivery_rows(&self, order_uid: &OrderUid) -> usize {
        count_rows(&self.tables.read().unwrap().deliveries, order_uid)
    }

    /// Number of payment rows stored for `order_uid`.
    #[must_use]
    pub fn payment_rows(&self, order_uid: &OrderUid) -> usize {
        count_rows(&self.tables.read().unwrap().payments, order_uid)
    }

    /// Number of item rows stored for `order_uid`.
    #[must_use]
    pub fn item_rows(&self, order_uid: &OrderUid) -> usize {
        count_rows(&self.tables.read().unwrap().items, order_uid)
    }

    /// Total rows across all four relations.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        let tables = self.tables.read().unwrap();
        tables.roots.len() + tables.deliveries.len() + tables.payments.len() + tables.items.len()
    }

    /// Insert a root record without child rows, as a partially written order
    /// would look in the database.
    pub fn insert_root_only(&self, order: &Order) {
        let mut tables = self.tables.write().unwrap();
        if !tables.roots.contains_key(&order.order_uid) {
            tables.root_order.push(order.order_uid.clone());
            tables.roots.insert(order.order_uid.clone(), root_of(order));
        }
    }

    /// Remove everything (for test isolation).
    pub fn clear(&self) {
        *self.tables.write().unwrap() = Tables::default();
    }

    fn assemble(tables: &Tables, order_uid: &OrderUid) -> Option<Order> {
        let mut order = tables.roots.get(order_uid)?.clone();
        order.delivery = first_row(&tables.deliveries, order_uid).unwrap_or_default();
        order.payment = first_row(&tables.payments, order_uid).unwrap_or_default();
        order.items = tables
            .items
            .iter()
            .filter(|(uid, _)| uid == order_uid)
            .map(|(_, item)| item.clone())
            .collect();
        Some(order)
    }
}

impl OrderStore for InMemoryOrderStore {
    fn save<'a>(&'a self, order: &'a Order) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            let scheduled_failure = self
                .pending_save_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if scheduled_failure || self.fail_saves.load(Ordering::SeqCst) {
                return Err(StoreError::Database("injected save failure".to_string()));
            }
            validate(order)?;

            let mut tables = self.tables.write().unwrap();
            let uid = order.order_uid.clone();
            if !tables.roots.contains_key(&uid) {
                tables.root_order.push(uid.clone());
                tables.roots.insert(uid.clone(), root_of(order));
            }
            tables.deliveries.push((uid.clone(), order.delivery.clone()));
            tables.payments.push((uid.clone(), order.payment.clone()));
            for item in &order.items {
                tables.items.push((uid.clone(), item.clone()));
            }
            Ok(())
        })
    }

    fn get_by_id<'a>(&'a self, order_uid: &'a OrderUid) -> StoreFuture<'a, Order> {
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Connection("injected read failure".to_string()));
            }
            let tables = self.tables.read().unwrap();
            Self::assemble(&tables, order_uid).ok_or_else(|| StoreError::NotFound(order_uid.clone()))
        })
    }

    fn get_all(&self) -> StoreFuture<'_, Vec<Order>> {
        Box::pin(async move {
            self.get_all_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Connection("injected read failure".to_string()));
            }
            let tables = self.tables.read().unwrap();
            Ok(tables
                .root_order
                .iter()
                .filter_map(|uid| Self::assemble(&tables, uid))
                .collect())
        })
    }
}

fn root_of(order: &Order) -> Order {
    Order {
        delivery: Delivery::default(),
        payment: Payment::default(),
        items: Vec::new(),
        ..order.clone()
    }
}

fn count_rows<T>(rows: &[(OrderUid, T)], order_uid: &OrderUid) -> usize {
    rows.iter().filter(|(uid, _)| uid == order_uid).count()
}

fn first_row<T: Clone>(rows: &[(OrderUid, T)], order_uid: &OrderUid) -> Option<T> {
    rows.iter()
        .find(|(uid, _)| uid == order_uid)
        .map(|(_, row)| row.clone())
}

fn validate(order: &Order) -> Result<(), StoreError> {
    let d = &order.delivery;
    let p = &order.payment;
    let mut columns: Vec<(&str, &str)> = vec![
        ("orders.order_uid", order.order_uid.as_str()),
        ("orders.track_number", &order.track_number),
        ("orders.entry", &order.entry),
        ("orders.locale", &order.locale),
        ("orders.internal_signature", &order.internal_signature),
        ("orders.customer_id", &order.customer_id),
        ("orders.delivery_service", &order.delivery_service),
        ("orders.shardkey", &order.shardkey),
        ("orders.oof_shard", &order.oof_shard),
        ("deliveries.name", &d.name),
        ("deliveries.phone", &d.phone),
        ("deliveries.zip", &d.zip),
        ("deliveries.city", &d.city),
        ("deliveries.address", &d.address),
        ("deliveries.region", &d.region),
        ("deliveries.email", &d.email),
        ("payments.transaction", &p.transaction),
        ("payments.request_id", &p.request_id),
        ("payments.currency", &p.currency),
        ("payments.provider", &p.provider),
        ("payments.bank", &p.bank),
    ];
    for item in &order.items {
        columns.extend([
            ("items.track_number", item.track_number.as_str()),
            ("items.rid", item.rid.as_str()),
            ("items.name", item.name.as_str()),
            ("items.size", item.size.as_str()),
            ("items.brand", item.brand.as_str()),
        ]);
    }

    match columns
        .into_iter()
        .find(|(_, value)| value.chars().count() > MAX_TEXT_LEN)
    {
        Some((column, _)) => Err(StoreError::Database(format!(
            "value too long for {column} (max {MAX_TEXT_LEN} characters)"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{order_with_items, sample_order};

    #[tokio::test]
    async fn save_then_get_returns_assembled_order() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();

        store.save(&order).await.unwrap();

        assert_eq!(store.get_by_id(&order.order_uid).await.unwrap(), order);
        assert_eq!(store.save_calls(), 1);
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn second_save_keeps_root_and_appends_children() {
        let store = InMemoryOrderStore::new();
        let order = order_with_items("o-1", 2);
        let mut changed = order.clone();
        changed.track_number = "CHANGED".to_string();
        changed.delivery.city = "Elsewhere".to_string();

        store.save(&order).await.unwrap();
        store.save(&changed).await.unwrap();

        let stored = store.get_by_id(&order.order_uid).await.unwrap();
        assert_eq!(stored.track_number, order.track_number);
        assert_eq!(stored.delivery, order.delivery);
        assert_eq!(stored.item_count(), 4);
        assert_eq!(store.delivery_rows(&order.order_uid), 2);
        assert_eq!(store.payment_rows(&order.order_uid), 2);
    }

    #[tokio::test]
    async fn oversized_field_rejects_whole_order() {
        let store = InMemoryOrderStore::new();
        let mut order = order_with_items("o-1", 3);
        order.items[2].name = "x".repeat(MAX_TEXT_LEN + 1);

        let err = store.save(&order).await.unwrap_err();

        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(store.total_rows(), 0);
    }

    #[tokio::test]
    async fn root_without_children_reads_as_zero_values() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();
        store.insert_root_only(&order);

        let stored = store.get_by_id(&order.order_uid).await.unwrap();

        assert_eq!(stored.delivery, Delivery::default());
        assert_eq!(stored.payment, Payment::default());
        assert!(stored.items.is_empty());
        assert_eq!(stored.track_number, order.track_number);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        let err = store.get_by_id(&OrderUid::new("ghost")).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(OrderUid::new("ghost")));
    }

    #[tokio::test]
    async fn get_all_returns_orders_in_insertion_order() {
        let store = InMemoryOrderStore::new();
        store.save(&order_with_items("b", 1)).await.unwrap();
        store.save(&order_with_items("a", 2)).await.unwrap();

        let all = store.get_all().await.unwrap();

        let uids: Vec<_> = all.iter().map(|o| o.order_uid.as_str()).collect();
        assert_eq!(uids, ["b", "a"]);
        assert_eq!(all[1].item_count(), 2);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let store = InMemoryOrderStore::new();
        store.fail_saves(true);
        store.fail_reads(true);

        assert!(store.save(&sample_order()).await.is_err());
        assert!(matches!(store.get_all().await, Err(StoreError::Connection(_))));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn scheduled_failures_run_out() {
        let store = InMemoryOrderStore::new();
        store.fail_next_saves(1);

        assert!(store.save(&sample_order()).await.is_err());
        assert!(store.save(&sample_order()).await.is_ok());
        assert_eq!(store.save_calls(), 2);
    }
}
