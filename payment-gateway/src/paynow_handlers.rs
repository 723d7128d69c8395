use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::paynow::ProviderError;
use crate::poller::StatusUpdate;
use crate::reply::{PaymentStatus, ProviderReply};
use crate::signing::InitiatePayload;

const DEFAULT_INITIATE_ERROR: &str = "Payment initiation failed";

/// JSON bodies are parsed by hand so malformed input gets the gateway's error
/// envelope instead of the extractor's plain-text rejection.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    let slice: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"{}" } else { &body[..] };
    serde_json::from_slice(slice).map_err(|e| ApiError::bad_request("invalid_json", format!("Invalid JSON body: {e}")))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiateAccepted {
    status: &'static str,
    redirect_url: Option<String>,
    poll_url: Option<String>,
    hash: Option<String>,
}

pub async fn initiate_payment(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let payload: InitiatePayload = parse_json(&body)?;
    let data = payload
        .validate(&state.config.paynow.return_url, &state.config.paynow.result_url)
        .map_err(|e| ApiError::bad_request(e.code(), e.to_string()))?;

    let reply = match state.paynow.initiate(&data).await {
        Ok(reply) => reply,
        Err(err) => {
            state.metrics.record_upstream("paynow", "error");
            let trace_id = Uuid::new_v4();
            error!(%trace_id, reference = %data.reference, error = %err, "Paynow initiate request failed");
            return Err(ApiError::internal(err, Some(trace_id)));
        }
    };
    Ok(initiate_response(&state, &data.reference, &reply))
}

pub(crate) fn initiate_response(state: &AppState, reference: &str, reply: &ProviderReply) -> Response {
    if reply.status() == Some(PaymentStatus::Ok) {
        state.metrics.record_upstream("paynow", "ok");
        if reply.get("hash").is_some() && !reply.verify_hash(&state.config.paynow.integration_key) {
            state.metrics.record_hash_mismatch("initiate");
            warn!(reference, "Paynow initiate reply hash did not verify");
        }
        info!(reference, poll_url = ?reply.get("pollurl"), "Paynow transaction initiated");
        let body = InitiateAccepted {
            status: "Ok",
            redirect_url: reply.owned("browserurl"),
            poll_url: reply.owned("pollurl"),
            hash: reply.owned("hash"),
        };
        (StatusCode::OK, Json(body)).into_response()
    } else {
        state.metrics.record_upstream("paynow", "rejected");
        let error = reply.get("error").unwrap_or(DEFAULT_INITIATE_ERROR);
        warn!(reference, error, "Paynow refused transaction");
        (StatusCode::BAD_REQUEST, Json(json!({ "status": "Error", "error": error }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub poll_url: Option<String>,
}

#[derive(Serialize)]
struct StatusBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    paynowreference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pollurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

pub async fn payment_status(State(state): State<AppState>, RawQuery(raw): RawQuery) -> ApiResult<Response> {
    let query: StatusQuery = serde_urlencoded::from_str(raw.as_deref().unwrap_or_default()).map_err(|err| {
        warn!(error = %err, "Rejected status query");
        ApiError::bad_request("invalid_query", "Malformed query string")
    })?;
    let poll_url = query
        .poll_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_poll_url", "Poll URL is required"))?;

    let reply = match state.paynow.poll(&poll_url).await {
        Ok(reply) => reply,
        Err(ProviderError::ForeignPollUrl(url)) => {
            warn!(poll_url = %url, "Refusing to poll foreign url");
            return Err(ApiError::bad_request("invalid_poll_url", "Poll URL must point at Paynow"));
        }
        Err(err) => {
            state.metrics.record_upstream("paynow", "error");
            let trace_id = Uuid::new_v4();
            error!(%trace_id, %poll_url, error = %err, "Paynow status check failed");
            return Err(ApiError::internal(err, Some(trace_id)));
        }
    };
    state.metrics.record_upstream("paynow", "ok");

    let update = StatusUpdate::from_reply(&reply, &state.config.paynow.integration_key);
    if update.hash.is_some() && !update.hash_valid {
        state.metrics.record_hash_mismatch("status");
        warn!(%poll_url, reference = ?update.reference, "Paynow status reply hash did not verify");
    }

    let body = StatusBody {
        status: reply.owned("status"),
        reference: update.reference,
        amount: update.amount,
        paynowreference: update.paynow_reference,
        pollurl: update.poll_url,
        hash: update.hash,
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// Paynow posts the final transaction state to the result URL.
pub async fn payment_result(State(state): State<AppState>, body: Bytes) -> ApiResult<&'static str> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)
        .map_err(|e| ApiError::bad_request("invalid_form", format!("Invalid form body: {e}")))?;
    let reply = ProviderReply::from_pairs(pairs);

    if reply.get("hash").is_none() {
        warn!("Paynow result callback without hash");
        return Err(ApiError::unauthorized("sig_missing", "Missing hash"));
    }
    if !reply.verify_hash(&state.config.paynow.integration_key) {
        state.metrics.record_hash_mismatch("result");
        warn!(reference = ?reply.get("reference"), "Paynow result callback hash mismatch");
        return Err(ApiError::unauthorized("sig_mismatch", "Hash mismatch"));
    }

    let status = reply.status().map(|s| s.to_string());
    state.metrics.record_upstream("paynow_result", "verified");
    info!(
        reference = ?reply.get("reference"),
        paynow_reference = ?reply.get("paynowreference"),
        status = ?status,
        "Paynow result received"
    );
    Ok("ok")
}
