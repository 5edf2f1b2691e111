//! Process-local read-through cache of assembled orders.
//!
//! [`OrderCache`] maps [`OrderUid`] to [`Order`] behind a reader/writer lock:
//! concurrent readers never block each other, a writer has exclusive access while
//! it mutates the map, and a reader sees either the old or the new entry for a key,
//! never a partial one. Values are cloned out, so no lock is held by callers.
//!
//! The cache is an explicit instance. Cloning an `OrderCache` produces another
//! handle to the same map; pass clones to the consumer and to request handlers.
//!
//! Entries live for the lifetime of the process. There is no eviction.
//!
//! # Example
//!
//! ```
//! use order_service_core::cache::OrderCache;
//! use order_service_core::order::{Order, OrderUid};
//!
//! let cache = OrderCache::new();
//! let order = Order { order_uid: OrderUid::new("o-1"), ..Order::default() };
//!
//! cache.set(order.clone());
//! assert_eq!(cache.get(&OrderUid::new("o-1")), Some(order));
//! assert_eq!(cache.get(&OrderUid::new("o-2")), None);
//! ```

use crate::order::{Order, OrderUid};
use crate::store::OrderStore;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Concurrent in-memory map from order identifier to order.
#[derive(Clone, Debug, Default)]
pub struct OrderCache {
    orders: Arc<RwLock<HashMap<OrderUid, Order>>>,
}

impl OrderCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an order. Never touches the store and never fails.
    #[must_use]
    pub fn get(&self, order_uid: &OrderUid) -> Option<Order> {
        self.orders
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(order_uid)
            .cloned()
    }

    /// Insert or overwrite the entry for `order.order_uid`. Last writer wins.
    pub fn set(&self, order: Order) {
        let mut orders = self
            .orders
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        orders.insert(order.order_uid.clone(), order);

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("orders.cache_size").set(orders.len() as f64);
    }

    /// Whether an entry exists for `order_uid`.
    #[must_use]
    pub fn contains(&self, order_uid: &OrderUid) -> bool {
        self.orders
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(order_uid)
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill the cache from the store's bulk read.
    ///
    /// Called once at startup. A failing bulk read is logged and leaves the cache
    /// as it was; startup continues in a degraded, cold-cache state. Returns the
    /// number of orders loaded.
    pub async fn warm_up(&self, store: &dyn OrderStore) -> usize {
        let orders = match store.get_all().await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Failed to warm up order cache, starting cold");
                return 0;
            }
        };

        let count = orders.len();
        {
            let mut cached = self
                .orders
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for order in orders {
                cached.insert(order.order_uid.clone(), order);
            }

            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!("orders.cache_size").set(cached.len() as f64);
        }

        tracing::info!(count, "Order cache warmed");
        count
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::store::{StoreError, StoreFuture};
    use proptest::prelude::*;

    fn order(uid: &str, track: &str) -> Order {
        Order {
            order_uid: OrderUid::new(uid),
            track_number: track.to_string(),
            ..Order::default()
        }
    }

    struct FixedStore(Result<Vec<Order>, StoreError>);

    impl OrderStore for FixedStore {
        fn save<'a>(&'a self, _order: &'a Order) -> StoreFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn get_by_id<'a>(&'a self, order_uid: &'a OrderUid) -> StoreFuture<'a, Order> {
            Box::pin(async move { Err(StoreError::NotFound(order_uid.clone())) })
        }

        fn get_all(&self) -> StoreFuture<'_, Vec<Order>> {
            let result = self.0.clone();
            Box::pin(async move { result })
        }
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let cache = OrderCache::new();
        cache.set(order("o-1", "first"));
        cache.set(order("o-1", "second"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&OrderUid::new("o-1")).unwrap().track_number, "second");
    }

    #[test]
    fn clones_share_the_same_map() {
        let cache = OrderCache::new();
        let handle = cache.clone();

        handle.set(order("o-1", "t"));
        assert!(cache.contains(&OrderUid::new("o-1")));
    }

    #[test]
    fn separate_instances_are_independent() {
        let a = OrderCache::new();
        let b = OrderCache::new();

        a.set(order("o-1", "t"));
        assert!(b.is_empty());
    }

    #[tokio::test]
    async fn warm_up_loads_every_order() {
        let cache = OrderCache::new();
        let store = FixedStore(Ok(vec![order("o-1", "a"), order("o-2", "b")]));

        let loaded = cache.warm_up(&store).await;

        assert_eq!(loaded, 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&OrderUid::new("o-2")).unwrap().track_number, "b");
    }

    #[tokio::test]
    async fn warm_up_tolerates_store_failure() {
        let cache = OrderCache::new();
        let store = FixedStore(Err(StoreError::Connection("refused".to_string())));

        let loaded = cache.warm_up(&store).await;

        assert_eq!(loaded, 0);
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_and_writer_see_whole_entries() {
        // Track number and entry always carry the same version, so a torn
        // read would show them disagreeing.
        fn versioned(i: usize) -> Order {
            Order {
                entry: format!("v{i}"),
                ..order("o-1", &format!("v{i}"))
            }
        }

        let cache = OrderCache::new();
        cache.set(versioned(0));
        let start = Arc::new(tokio::sync::Barrier::new(9));

        let writer = {
            let cache = cache.clone();
            let start = Arc::clone(&start);
            tokio::spawn(async move {
                start.wait().await;
                for i in 1..=2_000 {
                    cache.set(versioned(i));
                }
            })
        };

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let start = Arc::clone(&start);
                tokio::spawn(async move {
                    start.wait().await;
                    for _ in 0..2_000 {
                        let seen = cache.get(&OrderUid::new("o-1")).unwrap();
                        assert_eq!(seen.order_uid.as_str(), "o-1");
                        assert_eq!(seen.track_number, seen.entry);
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(cache.get(&OrderUid::new("o-1")).unwrap().track_number, "v2000");
        assert_eq!(cache.len(), 1);
    }

    proptest! {
        #[test]
        fn last_writer_wins(writes in prop::collection::vec((0u8..5, "[a-z]{1,8}"), 1..50)) {
            let cache = OrderCache::new();
            let mut expected = HashMap::new();

            for (key, track) in &writes {
                let uid = format!("o-{key}");
                cache.set(order(&uid, track));
                expected.insert(uid, track.clone());
            }

            prop_assert_eq!(cache.len(), expected.len());
            for (uid, track) in expected {
                let cached = cache.get(&OrderUid::new(uid)).unwrap();
                prop_assert_eq!(cached.track_number, track);
            }
        }
    }
}
