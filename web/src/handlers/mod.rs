//! HTTP request handlers.

pub mod health;
pub mod orders;

pub use health::healthz;
pub use orders::{get_order, missing_order_uid};
