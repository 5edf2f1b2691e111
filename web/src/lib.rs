//! Axum HTTP read API for the order service.
//!
//! # Routes
//!
//! ```text
//! GET /order/:order_uid   → 200 Order JSON | 404 NOT_FOUND | 500 INTERNAL_SERVER_ERROR
//! GET /order/             → 400 BAD_REQUEST
//! GET /healthz            → 200 {"status":"ok"}
//! anything else           → static files
//! ```
//!
//! Handlers only read. Orders enter the system through the consumer, never
//! through HTTP.
//!
//! # Example
//!
//! ```ignore
//! use order_service_web::router;
//!
//! let app = router(query, "./web/static");
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8081").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{routing::get, Router};
use order_service_core::OrderQuery;
use std::path::Path;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use middleware::{correlation_id_layer, CORRELATION_ID_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the service router.
///
/// Unmatched paths fall through to files under `static_dir`.
pub fn router(query: OrderQuery, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/order/", get(handlers::missing_order_uid))
        .route("/order/:order_uid", get(handlers::get_order))
        .route("/healthz", get(handlers::healthz))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(query)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}
