use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    upstream_requests: IntCounterVec,
    poll_checks: IntCounterVec,
    hash_mismatches: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let upstream_requests = IntCounterVec::new(
            Opts::new(
                "gateway_upstream_requests_total",
                "Provider calls grouped by provider and outcome",
            ),
            &["provider", "outcome"],
        )?;
        let poll_checks = IntCounterVec::new(
            Opts::new("gateway_poll_checks_total", "Payment status checks by outcome"),
            &["outcome"],
        )?;
        let hash_mismatches = IntCounterVec::new(
            Opts::new(
                "gateway_reply_hash_mismatch_total",
                "Provider replies whose integrity hash did not verify",
            ),
            &["source"],
        )?;
        registry.register(Box::new(upstream_requests.clone()))?;
        registry.register(Box::new(poll_checks.clone()))?;
        registry.register(Box::new(hash_mismatches.clone()))?;
        Ok(Self {
            registry,
            upstream_requests,
            poll_checks,
            hash_mismatches,
        })
    }

    pub fn record_upstream(&self, provider: &str, outcome: &str) {
        self.upstream_requests.with_label_values(&[provider, outcome]).inc();
    }

    pub fn record_poll_check(&self, outcome: &str) {
        self.poll_checks.with_label_values(&[outcome]).inc();
    }

    pub fn record_hash_mismatch(&self, source: &str) {
        self.hash_mismatches.with_label_values(&[source]).inc();
    }

    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn render(&self) -> Result<Response> {
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(self.gather_text()?))?;
        Ok(response)
    }
}
