//! Read path: cache first, store on miss, backfill before replying.
//!
//! ```text
//! lookup(uid) ──► cache.get ──hit──► Order
//!                     │
//!                    miss
//!                     ▼
//!               store.get_by_id ──NotFound──► StoreError::NotFound
//!                     │          ──failure───► StoreError::{Database, Connection}
//!                     ▼
//!               cache.set(order) ──► Order
//! ```
//!
//! Two concurrent misses for the same identifier may both read the store and both
//! backfill the cache. The writes carry the same order, so the race is harmless.

use crate::cache::OrderCache;
use crate::order::{Order, OrderUid};
use crate::store::{OrderStore, StoreError};
use std::sync::Arc;

/// Where a lookup was answered from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupSource {
    /// Served from the cache without touching the store
    Cache,
    /// Read from the store and backfilled into the cache
    Store,
}

/// Read-through lookup over an [`OrderCache`] and an [`OrderStore`].
#[derive(Clone)]
pub struct OrderQuery {
    cache: OrderCache,
    store: Arc<dyn OrderStore>,
}

impl OrderQuery {
    /// Create a query service sharing the given cache and store.
    #[must_use]
    pub fn new(cache: OrderCache, store: Arc<dyn OrderStore>) -> Self {
        Self { cache, store }
    }

    /// The cache this query reads through.
    #[must_use]
    pub const fn cache(&self) -> &OrderCache {
        &self.cache
    }

    /// Look up an order by identifier.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] when the order is neither cached nor stored
    /// - any other [`StoreError`] when the store fails during the fallback read
    pub async fn lookup(&self, order_uid: &OrderUid) -> Result<Order, StoreError> {
        self.lookup_with_source(order_uid).await.map(|(order, _)| order)
    }

    /// Like [`lookup`](Self::lookup), also reporting where the answer came from.
    ///
    /// # Errors
    ///
    /// Same as [`lookup`](Self::lookup).
    pub async fn lookup_with_source(
        &self,
        order_uid: &OrderUid,
    ) -> Result<(Order, LookupSource), StoreError> {
        if let Some(order) = self.cache.get(order_uid) {
            metrics::counter!("orders.cache_hits").increment(1);
            tracing::debug!(order_uid = %order_uid, "Order served from cache");
            return Ok((order, LookupSource::Cache));
        }

        metrics::counter!("orders.cache_misses").increment(1);
        let order = self.store.get_by_id(order_uid).await?;
        self.cache.set(order.clone());
        tracing::debug!(order_uid = %order_uid, "Order backfilled from store");

        Ok((order, LookupSource::Store))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::store::StoreFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        order: Option<Order>,
        fail: bool,
        reads: AtomicUsize,
    }

    impl CountingStore {
        fn holding(order: Option<Order>) -> Self {
            Self {
                order,
                fail: false,
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl OrderStore for CountingStore {
        fn save<'a>(&'a self, _order: &'a Order) -> StoreFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn get_by_id<'a>(&'a self, order_uid: &'a OrderUid) -> StoreFuture<'a, Order> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if self.fail {
                    return Err(StoreError::Connection("pool timed out".to_string()));
                }
                self.order
                    .clone()
                    .filter(|o| &o.order_uid == order_uid)
                    .ok_or_else(|| StoreError::NotFound(order_uid.clone()))
            })
        }

        fn get_all(&self) -> StoreFuture<'_, Vec<Order>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn order(uid: &str) -> Order {
        Order {
            order_uid: OrderUid::new(uid),
            ..Order::default()
        }
    }

    #[tokio::test]
    async fn cached_order_is_served_without_store_access() {
        let store = Arc::new(CountingStore::holding(None));
        let query = OrderQuery::new(OrderCache::new(), Arc::clone(&store) as Arc<dyn OrderStore>);
        query.cache().set(order("o-1"));

        let (found, source) = query.lookup_with_source(&OrderUid::new("o-1")).await.unwrap();

        assert_eq!(found.order_uid.as_str(), "o-1");
        assert_eq!(source, LookupSource::Cache);
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_reads_store_and_backfills() {
        let store = Arc::new(CountingStore::holding(Some(order("o-1"))));
        let query = OrderQuery::new(OrderCache::new(), Arc::clone(&store) as Arc<dyn OrderStore>);

        let (found, source) = query.lookup_with_source(&OrderUid::new("o-1")).await.unwrap();

        assert_eq!(source, LookupSource::Store);
        assert_eq!(query.cache().get(&OrderUid::new("o-1")), Some(found));

        query.lookup(&OrderUid::new("o-1")).await.unwrap();
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let store = Arc::new(CountingStore::holding(None));
        let query = OrderQuery::new(OrderCache::new(), store);

        let err = query.lookup(&OrderUid::new("ghost")).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(query.cache().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_distinguishable_from_not_found() {
        let store = Arc::new(CountingStore {
            fail: true,
            ..CountingStore::holding(None)
        });
        let query = OrderQuery::new(OrderCache::new(), store);

        let err = query.lookup(&OrderUid::new("o-1")).await.unwrap_err();

        assert!(!err.is_not_found());
        assert!(matches!(err, StoreError::Connection(_)));
    }
}
