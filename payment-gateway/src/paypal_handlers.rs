use axum::extract::{Path, State};
use axum::Json;
use bytes::Bytes;
use common_http_errors::{ApiError, ApiResult};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::paynow_handlers::parse_json;
use crate::paypal::{CreateOrderRequest, OrderRequest, PayPalError};

fn invalid_purchase_units() -> ApiError {
    ApiError::bad_request("invalid_purchase_units", "Invalid purchase_units")
}

/// Map a PayPal failure onto the gateway envelope. API errors keep PayPal's
/// status and body so the storefront can show the provider's reason.
pub(crate) fn paypal_failure(state: &AppState, err: PayPalError, code: &'static str, message: &'static str) -> ApiError {
    state.metrics.record_upstream("paypal", "error");
    match err {
        PayPalError::Api { status, details } => {
            warn!(status, %details, "{message}");
            ApiError::upstream(status, code, message, Some(details))
        }
        PayPalError::Auth { status, details } => {
            warn!(status, %details, "PayPal authentication failed");
            ApiError::upstream(502, "paypal_auth_failed", "PayPal authentication failed", Some(details))
        }
        PayPalError::MissingToken => {
            ApiError::upstream(502, "paypal_auth_failed", "PayPal authentication failed", None)
        }
        PayPalError::Transport(e) => {
            let trace_id = Uuid::new_v4();
            error!(%trace_id, error = %e, "PayPal request failed");
            ApiError::internal(e, Some(trace_id))
        }
    }
}

pub async fn create_order(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let raw: Value = parse_json(&body)?;
    if !raw.get("purchase_units").is_some_and(Value::is_array) {
        return Err(invalid_purchase_units());
    }
    let input: CreateOrderRequest = serde_json::from_value(raw).map_err(|e| {
        warn!(error = %e, "Rejected malformed purchase unit");
        invalid_purchase_units()
    })?;

    let order = OrderRequest::from_input(input, state.paypal.config(), &state.config.site_url);
    match state.paypal.create_order(&order).await {
        Ok(created) => {
            state.metrics.record_upstream("paypal", "ok");
            info!(order_id = ?created.get("id"), "PayPal order created");
            Ok(Json(created))
        }
        Err(err) => Err(paypal_failure(&state, err, "paypal_order_failed", "PayPal order creation failed")),
    }
}

pub async fn capture_order(State(state): State<AppState>, Path(order_id): Path<String>) -> ApiResult<Json<Value>> {
    let valid = !order_id.is_empty()
        && order_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ApiError::bad_request("invalid_order_id", "Invalid PayPal order id"));
    }

    match state.paypal.capture_order(&order_id).await {
        Ok(captured) => {
            state.metrics.record_upstream("paypal", "ok");
            info!(%order_id, status = ?captured.get("status"), "PayPal order captured");
            Ok(Json(captured))
        }
        Err(err) => Err(paypal_failure(&state, err, "paypal_capture_failed", "PayPal order capture failed")),
    }
}
