use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
}

/// Error envelope returned by every gateway endpoint.
///
/// `error` carries the human-readable summary, `code` the stable machine code
/// (mirrored in the `X-Error-Code` header).
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: String },
    MethodNotAllowed,
    Unauthorized { code: &'static str, message: String },
    Upstream { status: StatusCode, code: &'static str, message: String, details: Option<serde_json::Value> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self { Self::Internal { trace_id, message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, message: message.into() } }
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self { Self::Unauthorized { code, message: message.into() } }

    /// Relay a provider failure, keeping its status when it is a valid error status.
    pub fn upstream(status: u16, code: &'static str, message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        let status = StatusCode::from_u16(status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self::Upstream { status, code, message: message.into(), details }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest { code, message } => ErrorBody {
                error: message, code: code.into(), message: None, details: None, trace_id: None,
            },
            ApiError::MethodNotAllowed => ErrorBody {
                error: "Method not allowed".into(), code: "method_not_allowed".into(), message: None, details: None, trace_id: None,
            },
            ApiError::Unauthorized { code, message } => ErrorBody {
                error: message, code: code.into(), message: None, details: None, trace_id: None,
            },
            ApiError::Upstream { code, message, details, .. } => ErrorBody {
                error: message, code: code.into(), message: None, details, trace_id: None,
            },
            ApiError::Internal { trace_id, message } => ErrorBody {
                error: "Internal server error".into(), code: "internal_error".into(), message, details: None, trace_id,
            },
        };
        let error_code = body.code.clone();
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(&error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
