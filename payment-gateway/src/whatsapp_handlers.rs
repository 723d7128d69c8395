use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::notifier::{NotifyError, OutboundMessage};
use crate::paynow_handlers::parse_json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub to: Option<String>,
    pub message: Option<String>,
    pub order_id: Option<String>,
}

pub async fn send_message(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let request: SendMessageRequest = parse_json(&body)?;
    let (Some(to), Some(message)) = (
        request.to.filter(|v| !v.trim().is_empty()),
        request.message.filter(|v| !v.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("missing_fields", "Phone number and message are required"));
    };

    let outbound = OutboundMessage { to, body: message, order_id: request.order_id };
    match state.sender.send(&outbound).await {
        Ok(delivery) => {
            let outcome = if state.sender.is_live() { "ok" } else { "logged" };
            state.metrics.record_upstream("whatsapp", outcome);
            Ok(Json(delivery.to_json(&outbound)))
        }
        Err(NotifyError::Rejected { status, details }) => {
            state.metrics.record_upstream("whatsapp", "error");
            warn!(status, to = %outbound.to, "WhatsApp message failed");
            Err(ApiError::upstream(status, "whatsapp_failed", "WhatsApp message failed", Some(details)))
        }
        Err(NotifyError::Transport(e)) => {
            state.metrics.record_upstream("whatsapp", "error");
            let trace_id = Uuid::new_v4();
            error!(%trace_id, error = %e, "WhatsApp request failed");
            Err(ApiError::internal(e, Some(trace_id)))
        }
    }
}
