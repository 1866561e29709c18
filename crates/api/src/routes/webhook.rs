//! Payment gateway webhook.
//!
//! Mounted outside `/api` (and outside the rate limiters) because the
//! caller is the gateway, not a browser. The body must stay raw bytes:
//! the signature covers the exact payload as delivered.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use mercantile_core::UserId;

use crate::db::orders::PaymentConfirmation;
use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::services::checkout::{CheckoutService, SESSION_COMPLETED};
use crate::state::AppState;

/// Header carrying the gateway's signature.
const SIGNATURE_HEADER: &str = "gateway-signature";

/// Handle a webhook delivery from the payment gateway.
///
/// Only `checkout.session.completed` does anything: it turns the paying
/// user's cart into a paid order. Redeliveries are deduplicated by the
/// session id, so answering 200 twice is safe and keeps the gateway from
/// retrying forever.
///
/// # Errors
///
/// Returns 401 for a missing or bad signature, 400 for an unreadable
/// payload or metadata.
pub async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_owned()))?;

    state
        .checkout()
        .verify_signature(&body, signature, Utc::now())?;

    let event = CheckoutService::parse_event(&body)?;
    if event.event_type != SESSION_COMPLETED {
        tracing::debug!(event_type = %event.event_type, "ignoring webhook event");
        return Ok(Json(json!({ "received": true })));
    }

    let session = event.data.object;
    let user_id = session
        .metadata
        .user_id
        .as_deref()
        .and_then(|raw| raw.parse::<UserId>().ok())
        .ok_or_else(|| {
            AppError::BadRequest("webhook session has no usable user metadata".to_owned())
        })?;

    let confirmation = PaymentConfirmation {
        session_id: session.id,
        shipping: session.shipping.map(Into::into).unwrap_or_default(),
    };

    let order = OrderRepository::new(state.pool())
        .create_from_cart(user_id, Some(&confirmation))
        .await?;

    tracing::info!(
        order_id = %order.order.id,
        user_id = %user_id,
        total = %order.order.total_price,
        "order created from completed checkout"
    );
    Ok(Json(json!({ "received": true })))
}
