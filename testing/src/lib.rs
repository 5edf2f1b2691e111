//! # Order Service Testing
//!
//! Testing utilities for the order service.
//!
//! This crate provides:
//! - [`InMemoryOrderStore`]: relational store semantics without a database
//! - [`InMemoryEventSource`]: scripted broker subscriptions
//! - [`fixtures`]: canonical sample orders and payloads
//! - [`properties`]: proptest strategies for orders
//!
//! ## Example
//!
//! ```ignore
//! use order_service_core::{OrderCache, OrderConsumer};
//! use order_service_testing::{fixtures, InMemoryEventSource, InMemoryOrderStore};
//!
//! #[tokio::test]
//! async fn ingests_sample_order() {
//!     let source = Arc::new(InMemoryEventSource::new());
//!     source.push_closing_batch(vec![fixtures::sample_order_json()]);
//!
//!     let store = Arc::new(InMemoryOrderStore::new());
//!     let consumer = OrderConsumer::new(source, store.clone(), OrderCache::new());
//!     // ...
//! }
//! ```

pub mod fixtures;
pub mod source_mocks;
pub mod store_mocks;

/// Property-based testing strategies for orders.
pub mod properties {
    use chrono::{DateTime, TimeZone, Utc};
    use order_service_core::{Delivery, Item, Order, OrderUid, Payment};
    use proptest::prelude::*;

    fn text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ]{0,24}"
    }

    fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (0i64..4_000_000_000).prop_map(|secs| {
            Utc.timestamp_opt(secs, 0)
                .single()
                .unwrap_or_default()
        })
    }

    /// Strategy for a non-empty order identifier.
    pub fn arb_order_uid() -> impl Strategy<Value = OrderUid> {
        "[a-z0-9]{8,19}".prop_map(OrderUid::new)
    }

    /// Strategy for a delivery sub-record.
    pub fn arb_delivery() -> impl Strategy<Value = Delivery> {
        (text(), text(), text(), text(), text(), text(), text()).prop_map(
            |(name, phone, zip, city, address, region, email)| Delivery {
                name,
                phone,
                zip,
                city,
                address,
                region,
                email,
            },
        )
    }

    /// Strategy for a payment sub-record.
    pub fn arb_payment() -> impl Strategy<Value = Payment> {
        (text(), text(), text(), 0i64..1_000_000, 0i64..4_000_000_000, 0i64..10_000)
            .prop_map(|(transaction, currency, bank, amount, payment_dt, delivery_cost)| Payment {
                transaction,
                currency,
                provider: "wbpay".to_string(),
                amount,
                payment_dt,
                bank,
                delivery_cost,
                goods_total: amount - delivery_cost,
                ..Payment::default()
            })
    }

    /// Strategy for a line item.
    pub fn arb_item() -> impl Strategy<Value = Item> {
        (any::<i64>(), text(), 0i64..100_000, 0i32..100, text(), 0i32..500).prop_map(
            |(chrt_id, name, price, sale, brand, status)| Item {
                chrt_id,
                name,
                price,
                sale,
                total_price: price - price * i64::from(sale) / 100,
                brand,
                status,
                ..Item::default()
            },
        )
    }

    /// Strategy for a complete order whose text fields fit the storage limits.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        (
            arb_order_uid(),
            text(),
            arb_delivery(),
            arb_payment(),
            prop::collection::vec(arb_item(), 0..5),
            text(),
            any::<i32>(),
            timestamp(),
        )
            .prop_map(
                |(order_uid, track_number, delivery, payment, items, customer_id, sm_id, date_created)| {
                    Order {
                        order_uid,
                        track_number,
                        entry: "WBIL".to_string(),
                        delivery,
                        payment,
                        items,
                        locale: "en".to_string(),
                        customer_id,
                        delivery_service: "meest".to_string(),
                        shardkey: "9".to_string(),
                        sm_id,
                        date_created,
                        oof_shard: "1".to_string(),
                        ..Order::default()
                    }
                },
            )
    }
}

/// Install a `tracing` subscriber that writes to the test harness output.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use fixtures::{sample_order, sample_order_json};
pub use source_mocks::InMemoryEventSource;
pub use store_mocks::InMemoryOrderStore;
