//! Canonical sample orders.
//!
//! [`sample_order_json`] is the wire payload a producer publishes;
//! [`sample_order`] is the value it decodes to.

use chrono::{DateTime, TimeZone, Utc};
use order_service_core::{Delivery, Item, Order, OrderUid, Payment};

/// Identifier of the canonical sample order.
pub const SAMPLE_ORDER_UID: &str = "b563feb7b2b84b6test";

fn sample_created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
        .single()
        .unwrap_or_default()
}

/// The sample order with one item and populated delivery and payment.
#[must_use]
pub fn sample_order() -> Order {
    Order {
        order_uid: OrderUid::new(SAMPLE_ORDER_UID),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: SAMPLE_ORDER_UID.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9_934_930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: sample_created_at(),
        oof_shard: "1".to_string(),
    }
}

/// The sample order as a producer would publish it.
#[must_use]
pub fn sample_order_json() -> Vec<u8> {
    br#"{
  "order_uid": "b563feb7b2b84b6test",
  "track_number": "WBILMTESTTRACK",
  "entry": "WBIL",
  "delivery": {
    "name": "Test Testov",
    "phone": "+9720000000",
    "zip": "2639809",
    "city": "Kiryat Mozkin",
    "address": "Ploshad Mira 15",
    "region": "Kraiot",
    "email": "test@gmail.com"
  },
  "payment": {
    "transaction": "b563feb7b2b84b6test",
    "request_id": "",
    "currency": "USD",
    "provider": "wbpay",
    "amount": 1817,
    "payment_dt": 1637907727,
    "bank": "alpha",
    "delivery_cost": 1500,
    "goods_total": 317,
    "custom_fee": 0
  },
  "items": [
    {
      "chrt_id": 9934930,
      "track_number": "WBILMTESTTRACK",
      "price": 453,
      "rid": "ab4219087a764ae0btest",
      "name": "Mascaras",
      "sale": 30,
      "size": "0",
      "total_price": 317,
      "nm_id": 2389212,
      "brand": "Vivienne Sabo",
      "status": 202
    }
  ],
  "locale": "en",
  "internal_signature": "",
  "customer_id": "test",
  "delivery_service": "meest",
  "shardkey": "9",
  "sm_id": 99,
  "date_created": "2021-11-26T06:22:19Z",
  "oof_shard": "1"
}"#
    .to_vec()
}

/// A minimal order with the given identifier, one delivery, one payment and
/// `items` numbered line items.
#[must_use]
pub fn order_with_items(order_uid: &str, items: usize) -> Order {
    let mut order = sample_order();
    let template = order.items.first().cloned().unwrap_or_default();
    order.order_uid = OrderUid::new(order_uid);
    order.payment.transaction = order_uid.to_string();
    order.items = (0..items)
        .map(|i| Item {
            chrt_id: i64::try_from(i).unwrap_or_default(),
            name: format!("item-{i}"),
            ..template.clone()
        })
        .collect();
    order
}
