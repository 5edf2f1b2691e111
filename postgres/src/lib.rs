//! `PostgreSQL` order store for the order service.
//!
//! [`PostgresOrderStore`] implements [`OrderStore`] over four relations:
//!
//! ```text
//! orders (order_uid PK) ◄── deliveries (id, order_uid FK)
//!                       ◄── payments   (id, order_uid FK)
//!                       ◄── items      (id, order_uid FK)
//! ```
//!
//! - `save` writes all four relations in one transaction. The root insert is
//!   `ON CONFLICT DO NOTHING`; child rows are always appended, so saving the same
//!   order twice keeps one root and doubles its child rows.
//! - `get_by_id` reads the root, the earliest delivery and payment row (zero
//!   values when absent) and every item in insertion order.
//! - `get_all` reads every root, then each order's children with independent
//!   queries. It is not a consistent snapshot and is meant for cache warm-up.
//!
//! # Example
//!
//! ```ignore
//! use order_service_postgres::PostgresOrderStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresOrderStore::connect("postgres://localhost/orders", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use order_service_core::{
    Delivery, Item, Order, OrderStore, OrderUid, Payment, StoreError, StoreFuture,
};
use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Self {
            name: row.name,
            phone: row.phone,
            zip: row.zip,
            city: row.city,
            address: row.address,
            region: row.region,
            email: row.email,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    transaction: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost: i64,
    goods_total: i64,
    custom_fee: i64,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            transaction: row.transaction,
            request_id: row.request_id,
            currency: row.currency,
            provider: row.provider,
            amount: row.amount,
            payment_dt: row.payment_dt,
            bank: row.bank,
            delivery_cost: row.delivery_cost,
            goods_total: row.goods_total,
            custom_fee: row.custom_fee,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    chrt_id: i64,
    track_number: String,
    price: i64,
    rid: String,
    name: String,
    sale: i32,
    size: String,
    total_price: i64,
    nm_id: i64,
    brand: String,
    status: i32,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

const SELECT_ORDER_COLUMNS: &str = "SELECT order_uid, track_number, entry, locale, \
     internal_signature, customer_id, delivery_service, shardkey, sm_id, date_created, \
     oof_shard FROM orders";

/// PostgreSQL-backed [`OrderStore`].
#[derive(Clone, Debug)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool and create a store over it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to order database");
        Ok(Self::new(pool))
    }

    /// Create or upgrade the order tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(format!("Migration failed: {e}")))?;

        tracing::info!("Order database migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        let uid = order.order_uid.as_str();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin transaction", &e))?;

        sqlx::query(
            r"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature, customer_id,
                delivery_service, shardkey, sm_id, date_created, oof_shard
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO NOTHING
            ",
        )
        .bind(uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert order", &e))?;

        let d = &order.delivery;
        sqlx::query(
            r"
            INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(uid)
        .bind(&d.name)
        .bind(&d.phone)
        .bind(&d.zip)
        .bind(&d.city)
        .bind(&d.address)
        .bind(&d.region)
        .bind(&d.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert delivery", &e))?;

        let p = &order.payment;
        sqlx::query(
            r"
            INSERT INTO payments (
                order_uid, transaction, request_id, currency, provider, amount, payment_dt,
                bank, delivery_cost, goods_total, custom_fee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(uid)
        .bind(&p.transaction)
        .bind(&p.request_id)
        .bind(&p.currency)
        .bind(&p.provider)
        .bind(p.amount)
        .bind(p.payment_dt)
        .bind(&p.bank)
        .bind(p.delivery_cost)
        .bind(p.goods_total)
        .bind(p.custom_fee)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert payment", &e))?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO items (
                    order_uid, chrt_id, track_number, price, rid, name, sale, size,
                    total_price, nm_id, brand, status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ",
            )
            .bind(uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert item", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit order", &e))?;

        tracing::debug!(order_uid = uid, items = order.items.len(), "Order persisted");
        Ok(())
    }

    async fn load_order(&self, order_uid: &OrderUid) -> Result<Order, StoreError> {
        let row: OrderRow = sqlx::query_as(&format!("{SELECT_ORDER_COLUMNS} WHERE order_uid = $1"))
            .bind(order_uid.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("select order", &e))?
            .ok_or_else(|| StoreError::NotFound(order_uid.clone()))?;

        self.assemble(row).await
    }

    async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!("{SELECT_ORDER_COLUMNS} ORDER BY order_uid"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("select orders", &e))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.assemble(row).await?);
        }
        Ok(orders)
    }

    async fn assemble(&self, row: OrderRow) -> Result<Order, StoreError> {
        let uid = row.order_uid.as_str();

        let delivery: Option<DeliveryRow> = sqlx::query_as(
            r"
            SELECT name, phone, zip, city, address, region, email
            FROM deliveries WHERE order_uid = $1
            ORDER BY id LIMIT 1
            ",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("select delivery", &e))?;

        let payment: Option<PaymentRow> = sqlx::query_as(
            r"
            SELECT transaction, request_id, currency, provider, amount, payment_dt,
                   bank, delivery_cost, goods_total, custom_fee
            FROM payments WHERE order_uid = $1
            ORDER BY id LIMIT 1
            ",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("select payment", &e))?;

        let items: Vec<ItemRow> = sqlx::query_as(
            r"
            SELECT chrt_id, track_number, price, rid, name, sale, size, total_price,
                   nm_id, brand, status
            FROM items WHERE order_uid = $1
            ORDER BY id
            ",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("select items", &e))?;

        Ok(Order {
            order_uid: OrderUid::new(row.order_uid),
            track_number: row.track_number,
            entry: row.entry,
            delivery: delivery.map(Delivery::from).unwrap_or_default(),
            payment: payment.map(Payment::from).unwrap_or_default(),
            items: items.into_iter().map(Item::from).collect(),
            locale: row.locale,
            internal_signature: row.internal_signature,
            customer_id: row.customer_id,
            delivery_service: row.delivery_service,
            shardkey: row.shardkey,
            sm_id: row.sm_id,
            date_created: row.date_created,
            oof_shard: row.oof_shard,
        })
    }
}

impl OrderStore for PostgresOrderStore {
    fn save<'a>(&'a self, order: &'a Order) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let result = self.save_order(order).await;
            if result.is_err() {
                metrics::counter!("order_store.errors", "operation" => "save").increment(1);
            }
            result
        })
    }

    fn get_by_id<'a>(&'a self, order_uid: &'a OrderUid) -> StoreFuture<'a, Order> {
        Box::pin(async move {
            let result = self.load_order(order_uid).await;
            if matches!(result, Err(ref e) if !e.is_not_found()) {
                metrics::counter!("order_store.errors", "operation" => "get_by_id").increment(1);
            }
            result
        })
    }

    fn get_all(&self) -> StoreFuture<'_, Vec<Order>> {
        Box::pin(async move {
            let result = self.load_all().await;
            if result.is_err() {
                metrics::counter!("order_store.errors", "operation" => "get_all").increment(1);
            }
            result
        })
    }
}

/// Classify a driver error: losing the database is a connection problem,
/// anything the database itself rejected is a database error.
fn map_sqlx_error(context: &str, error: &sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Connection(format!("Failed to {context}: {error}")),
        _ => StoreError::Database(format!("Failed to {context}: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_loss_is_a_connection_error() {
        let error = map_sqlx_error("select order", &sqlx::Error::PoolTimedOut);
        assert!(matches!(error, StoreError::Connection(_)));
    }

    #[test]
    fn rejected_statement_is_a_database_error() {
        let error = map_sqlx_error("insert item", &sqlx::Error::RowNotFound);
        assert!(matches!(error, StoreError::Database(ref m) if m.starts_with("Failed to insert item")));
    }
}
