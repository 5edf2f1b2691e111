//! Order lookup endpoint.

use crate::error::AppError;
use crate::WebResult;
use axum::{
    extract::{Path, State},
    Json,
};
use order_service_core::{Order, OrderQuery, OrderUid};

/// Fetch one order, from the cache when possible.
///
/// # Endpoint
///
/// ```text
/// GET /order/:order_uid
/// ```
///
/// # Errors
///
/// - `400` when the identifier is blank
/// - `404` when the order is neither cached nor stored
/// - `500` when the store fails during the fallback read
pub async fn get_order(
    State(query): State<OrderQuery>,
    Path(order_uid): Path<String>,
) -> WebResult<Json<Order>> {
    if order_uid.trim().is_empty() {
        return Err(AppError::bad_request("missing order_uid"));
    }

    let order_uid = OrderUid::new(order_uid);
    let (order, source) = query.lookup_with_source(&order_uid).await?;
    tracing::debug!(order_uid = %order_uid, source = ?source, "Order lookup served");

    Ok(Json(order))
}

/// `GET /order/` with no identifier.
///
/// # Errors
///
/// Always returns `400`.
#[allow(clippy::unused_async)]
pub async fn missing_order_uid() -> WebResult<Json<Order>> {
    Err(AppError::bad_request("missing order_uid"))
}
