//! The order aggregate.
//!
//! An [`Order`] is the unit of persistence, caching and lookup. It owns exactly
//! one [`Delivery`], exactly one [`Payment`] and a list of [`Item`]s. None of the
//! sub-records has an identity of its own; they exist only as part of the order
//! identified by its [`OrderUid`].
//!
//! # Wire format
//!
//! Orders travel as flat JSON objects with nested `delivery`, `payment` and
//! `items` members. Field names are snake_case and case-sensitive. Missing fields
//! decode to zero values and unknown fields are ignored, so a sparse payload still
//! produces an order with zero-valued sub-records.
//!
//! Inbound payloads go through [`Order::from_json`], which is stricter than the
//! derived `Deserialize`: the payload and its `delivery`, `payment` and `items`
//! members must be objects (or an array of objects), `order_uid` must be
//! non-empty, and `date_created` is truncated to the microsecond precision the
//! store keeps.
//!
//! ```
//! use order_service_core::order::Order;
//!
//! let order = Order::from_json(br#"{"order_uid": "abc", "items": []}"#).unwrap();
//! assert_eq!(order.order_uid.as_str(), "abc");
//! assert!(order.delivery.name.is_empty());
//!
//! assert!(Order::from_json(br#"["abc"]"#).is_err());
//! ```

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `OrderUid` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid order uid: {0}")]
pub struct ParseOrderUidError(String);

/// Error type for [`Order::from_json`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeOrderError {
    /// Not JSON, not shaped like an order, or a field of the wrong type.
    #[error("Malformed order payload: {0}")]
    Malformed(String),

    /// The payload carries no usable identifier.
    #[error(transparent)]
    InvalidUid(#[from] ParseOrderUidError),
}

/// Sub-second digits kept by `TIMESTAMPTZ`.
const TIMESTAMP_PRECISION: u16 = 6;

/// Globally unique order identifier.
///
/// The sole key for lookup, storage and caching. Immutable once assigned.
///
/// # Validation
///
/// - `FromStr::from_str()`: rejects empty strings (use for external input)
/// - `From::from()` and `new()`: no validation (trusted input)
///
/// # Examples
///
/// ```
/// use order_service_core::order::OrderUid;
///
/// let uid = OrderUid::new("b563feb7b2b84b6test");
/// assert_eq!(uid.as_str(), "b563feb7b2b84b6test");
///
/// assert!("".parse::<OrderUid>().is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderUid(String);

impl OrderUid {
    /// Create a new `OrderUid` from a string.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert into the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderUid {
    type Err = ParseOrderUidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseOrderUidError("Order uid cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderUid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderUid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Order aggregate root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Unique identifier
    pub order_uid: OrderUid,
    /// Shipment track number
    pub track_number: String,
    /// Entry point code
    pub entry: String,
    /// Recipient and address (1:1)
    pub delivery: Delivery,
    /// Transaction details (1:1)
    pub payment: Payment,
    /// Line items (1:N)
    pub items: Vec<Item>,
    /// Customer locale
    pub locale: String,
    /// Internal signature
    pub internal_signature: String,
    /// Customer identifier
    pub customer_id: String,
    /// Delivery service name
    pub delivery_service: String,
    /// Shard key
    pub shardkey: String,
    /// SM identifier
    pub sm_id: i32,
    /// Creation timestamp
    pub date_created: DateTime<Utc>,
    /// OOF shard
    pub oof_shard: String,
}

impl Order {
    /// Decode an inbound payload.
    ///
    /// # Errors
    ///
    /// - [`DecodeOrderError::Malformed`] if the payload is not a JSON object, a
    ///   nested member has the wrong shape or a field has the wrong type
    /// - [`DecodeOrderError::InvalidUid`] if `order_uid` is missing or empty
    pub fn from_json(payload: &[u8]) -> Result<Self, DecodeOrderError> {
        let fields: Map<String, Value> = serde_json::from_slice(payload)
            .map_err(|e| DecodeOrderError::Malformed(e.to_string()))?;

        for member in ["delivery", "payment"] {
            if fields.get(member).is_some_and(|v| !v.is_object()) {
                return Err(DecodeOrderError::Malformed(format!("`{member}` must be an object")));
            }
        }
        if let Some(items) = fields.get("items") {
            let all_objects = items
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object));
            if !all_objects {
                return Err(DecodeOrderError::Malformed(
                    "`items` must be an array of objects".to_string(),
                ));
            }
        }

        let mut order = Self::deserialize(Value::Object(fields))
            .map_err(|e| DecodeOrderError::Malformed(e.to_string()))?;
        order.order_uid = order.order_uid.as_str().parse()?;
        order.date_created = order.date_created.trunc_subsecs(TIMESTAMP_PRECISION);

        Ok(order)
    }

    /// Number of line items carried by this order.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Recipient contact and address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    /// Recipient name
    pub name: String,
    /// Phone number
    pub phone: String,
    /// Postal code
    pub zip: String,
    /// City
    pub city: String,
    /// Street address
    pub address: String,
    /// Region
    pub region: String,
    /// Email address
    pub email: String,
}

/// Payment transaction and monetary amounts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    /// Transaction identifier
    pub transaction: String,
    /// Request identifier
    pub request_id: String,
    /// Currency code
    pub currency: String,
    /// Payment provider
    pub provider: String,
    /// Total amount
    pub amount: i64,
    /// Payment time (Unix seconds)
    pub payment_dt: i64,
    /// Bank
    pub bank: String,
    /// Delivery cost
    pub delivery_cost: i64,
    /// Goods total
    pub goods_total: i64,
    /// Custom fee
    pub custom_fee: i64,
}

/// A single line item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Chart identifier
    pub chrt_id: i64,
    /// Track number
    pub track_number: String,
    /// Unit price
    pub price: i64,
    /// Row identifier
    pub rid: String,
    /// Product name
    pub name: String,
    /// Discount percent
    pub sale: i32,
    /// Size label
    pub size: String,
    /// Price after discount
    pub total_price: i64,
    /// Nomenclature identifier
    pub nm_id: i64,
    /// Brand
    pub brand: String,
    /// Status code
    pub status: i32,
}
