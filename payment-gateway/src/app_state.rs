use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use common_http_errors::ApiError;
use reqwest::Client;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, warn};

use crate::checkout_handlers::checkout;
use crate::config::GatewayConfig;
use crate::metrics::GatewayMetrics;
use crate::notifier::{sender_from_config, MessageSender};
use crate::paynow::PaynowClient;
use crate::paynow_handlers::{initiate_payment, payment_result, payment_status};
use crate::paypal::PayPalClient;
use crate::paypal_handlers::{capture_order, create_order};
use crate::poller::PollHandle;
use crate::whatsapp_handlers::send_message;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub paynow: PaynowClient,
    pub paypal: PayPalClient,
    pub sender: Arc<dyn MessageSender>,
    pub metrics: Arc<GatewayMetrics>,
    /// Background polls keyed by order id.
    pub polls: Arc<Mutex<HashMap<String, PollHandle>>>,
}

impl AppState {
    pub fn new(config: GatewayConfig, http_client: Client) -> anyhow::Result<Self> {
        let metrics = Arc::new(GatewayMetrics::new()?);
        let sender = sender_from_config(http_client.clone(), config.whatsapp.as_ref());
        Ok(Self {
            paynow: PaynowClient::new(http_client.clone(), config.paynow.clone()),
            paypal: PayPalClient::new(http_client, config.paypal.clone()),
            sender,
            metrics,
            config: Arc::new(config),
            polls: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn with_sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sender = sender;
        self
    }

    /// Keep one poll per order; a newer attempt cancels the previous one.
    pub fn track_poll(&self, order_id: String, handle: PollHandle) {
        let Ok(mut polls) = self.polls.lock() else {
            warn!(%order_id, "Poll registry poisoned; poll left untracked");
            return;
        };
        polls.retain(|_, h| !h.is_finished());
        if let Some(previous) = polls.insert(order_id.clone(), handle) {
            debug!(%order_id, "Cancelling superseded status poll");
            previous.cancel();
        }
    }

    pub fn active_polls(&self) -> usize {
        self.polls
            .lock()
            .map(|polls| polls.values().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => ApiError::internal(err, None).into_response(),
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn cors(methods: &[Method]) -> CorsLayer {
    let mut allowed = methods.to_vec();
    allowed.push(Method::OPTIONS);
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_headers([CONTENT_TYPE])
        .allow_methods(allowed)
}

/// Browser-facing endpoint: CORS preflight answered by the layer, any other
/// unrouted method gets the JSON 405.
fn endpoint(route: MethodRouter<AppState>, methods: &[Method]) -> MethodRouter<AppState> {
    route.fallback(method_not_allowed).layer(cors(methods))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/api/paynow/initiate", endpoint(post(initiate_payment), &[Method::POST]))
        .route("/api/paynow/status", endpoint(get(payment_status), &[Method::GET]))
        .route("/api/paynow/result", endpoint(post(payment_result), &[Method::POST]))
        .route("/api/paypal/create-order", endpoint(post(create_order), &[Method::POST]))
        .route(
            "/api/paypal/capture-order/:order_id",
            endpoint(post(capture_order), &[Method::POST]),
        )
        .route("/api/whatsapp/send-message", endpoint(post(send_message), &[Method::POST]))
        .route("/api/checkout", endpoint(post(checkout), &[Method::POST]))
        .with_state(state)
}
