use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::checkout::{CheckoutMethod, CheckoutObserver, PaymentOrder};
use crate::paynow_handlers::{initiate_response, parse_json};
use crate::paypal::OrderRequest;
use crate::paypal_handlers::paypal_failure;
use crate::poller::StatusPoller;
use crate::reply::PaymentStatus;
use crate::signing::PaynowMethod;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub order: PaymentOrder,
    pub method: CheckoutMethod,
}

pub async fn checkout(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request: CheckoutRequest = parse_json(&body)?;
    if !request.order.amount.is_positive() {
        return Err(ApiError::bad_request("invalid_amount", "Amount must be greater than zero"));
    }

    match request.method.paynow_method() {
        Some(method) => mobile_checkout(state, request.order, method).await,
        None => paypal_checkout(state, request.order).await,
    }
}

async fn mobile_checkout(state: AppState, order: PaymentOrder, method: PaynowMethod) -> ApiResult<Response> {
    if order.customer_phone.as_deref().map_or(true, |p| p.trim().is_empty()) {
        return Err(ApiError::bad_request(
            "missing_phone",
            "Phone number is required for mobile money payments",
        ));
    }

    let data = order.paynow_data(method, &state.config.site_url);
    let reply = match state.paynow.initiate(&data).await {
        Ok(reply) => reply,
        Err(err) => {
            state.metrics.record_upstream("paynow", "error");
            let trace_id = Uuid::new_v4();
            error!(%trace_id, order_id = %order.id, error = %err, "Checkout initiate failed");
            return Err(ApiError::internal(err, Some(trace_id)));
        }
    };

    let response = initiate_response(&state, &order.id, &reply);
    if let (Some(PaymentStatus::Ok), Some(poll_url)) = (reply.status(), reply.owned("pollurl")) {
        let poller = StatusPoller::new(Arc::new(state.paynow.clone()), state.config.poll_policy)
            .with_metrics(state.metrics.clone());
        let order_id = order.id.clone();
        let observer = Arc::new(CheckoutObserver::new(order, state.sender.clone()));
        let handle = poller.spawn(poll_url, observer);
        info!(%order_id, %method, "Started background status poll");
        state.track_poll(order_id, handle);
    }
    Ok(response)
}

async fn paypal_checkout(state: AppState, order: PaymentOrder) -> ApiResult<Response> {
    let request = OrderRequest::from_input(order.paypal_order(), state.paypal.config(), &state.config.site_url);
    match state.paypal.create_order(&request).await {
        Ok(created) => {
            state.metrics.record_upstream("paypal", "ok");
            info!(order_id = %order.id, paypal_order = ?created.get("id"), "PayPal checkout order created");
            Ok(Json(created).into_response())
        }
        Err(err) => Err(paypal_failure(&state, err, "paypal_order_failed", "PayPal order creation failed")),
    }
}
