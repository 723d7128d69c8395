mod support;

use axum::http::StatusCode;
use httpmock::prelude::*;
use payment_gateway::{GatewayConfig, InitiateRequest, PaynowMethod, PaynowPaymentData};
use serde_json::json;
use support::{app, json_post, raw_request, send, signed_reply, INTEGRATION_KEY};

#[tokio::test]
async fn initiate_signs_request_and_maps_success() {
    let server = MockServer::start_async().await;
    let config = GatewayConfig::for_upstream(&server.base_url());
    let expected = InitiateRequest::build(
        "1201",
        &PaynowPaymentData {
            reference: "ORD-1".into(),
            amount: "87.5".parse().unwrap(),
            email: "a@b.com".into(),
            phone: None,
            method: PaynowMethod::Ecocash,
            return_url: config.paynow.return_url.clone(),
            result_url: config.paynow.result_url.clone(),
        },
        INTEGRATION_KEY,
    );
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/interface/initiatetransaction")
                .body_contains("reference=ORD-1")
                .body_contains("amount=87.50")
                .body_contains("method=ecocash")
                .body_contains(format!("hash={}", expected.hash()));
            then.status(200).body(
                "status=Ok\nbrowserurl=https://www.paynow.co.zw/Payment/ConfirmPayment/1\n\
                 pollurl=https://www.paynow.co.zw/Interface/CheckPayment/?guid=abc\nhash=ABC123\n",
            );
        })
        .await;

    let app = app(config);
    // client-supplied credentials are ignored in favour of server configuration
    let body = json!({
        "integration_id": "999",
        "integration_key": "client-key",
        "reference": "ORD-1",
        "amount": 87.5,
        "email": "a@b.com",
        "method": "ecocash"
    });
    let (status, _, body) = send(&app, json_post("/api/paynow/initiate", body)).await;
    upstream.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Ok");
    assert_eq!(body["redirectUrl"], "https://www.paynow.co.zw/Payment/ConfirmPayment/1");
    assert_eq!(body["pollUrl"], "https://www.paynow.co.zw/Interface/CheckPayment/?guid=abc");
    assert_eq!(body["hash"], "ABC123");
}

#[tokio::test]
async fn initiate_relays_provider_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/interface/initiatetransaction");
            then.status(200).body("status=Error\nerror=Insufficient funds\n");
        })
        .await;
    let app = app(GatewayConfig::for_upstream(&server.base_url()));
    let body = json!({"reference": "ORD-1", "amount": 87.5, "email": "a@b.com", "method": "ecocash"});
    let (status, _, body) = send(&app, json_post("/api/paynow/initiate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": "Error", "error": "Insufficient funds"}));
}

#[tokio::test]
async fn initiate_defaults_error_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/interface/initiatetransaction");
            then.status(200).body("garbage without separators");
        })
        .await;
    let app = app(GatewayConfig::for_upstream(&server.base_url()));
    let body = json!({"reference": "ORD-1", "amount": "10", "email": "a@b.com", "method": "onemoney"});
    let (status, _, body) = send(&app, json_post("/api/paynow/initiate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Payment initiation failed");
}

#[tokio::test]
async fn initiate_rejects_incomplete_payload_without_calling_paynow() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST).path("/interface/initiatetransaction");
            then.status(200).body("status=Ok\n");
        })
        .await;
    let app = app(GatewayConfig::for_upstream(&server.base_url()));

    let body = json!({"reference": "ORD-1", "email": "a@b.com", "method": "ecocash"});
    let (status, headers, body) = send(&app, json_post("/api/paynow/initiate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "missing_fields");
    assert!(body["error"].as_str().unwrap().contains("amount"));

    let (status, _, body) = send(&app, raw_request("POST", "/api/paynow/initiate", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_json");

    let body = json!({"reference": "ORD-1", "amount": 5, "email": "a@b.com", "method": "paypal"});
    let (status, _, body) = send(&app, json_post("/api/paynow/initiate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_method");

    let body = json!({"reference": "ORD-1", "amount": -1, "email": "a@b.com", "method": "ecocash"});
    let (status, _, body) = send(&app, json_post("/api/paynow/initiate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_amount");

    // rounds to 0.00 before signing
    let body = json!({"reference": "ORD-1", "amount": 0.004, "email": "a@b.com", "method": "ecocash"});
    let (status, _, body) = send(&app, json_post("/api/paynow/initiate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_amount");

    upstream.assert_hits_async(0).await;
}

#[tokio::test]
async fn initiate_transport_failure_is_internal_error() {
    // nothing listens on the discard port
    let app = app(GatewayConfig::for_upstream("http://127.0.0.1:9"));
    let body = json!({"reference": "ORD-1", "amount": 1, "email": "a@b.com", "method": "ecocash"});
    let (status, _, body) = send(&app, json_post("/api/paynow/initiate", body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(body["message"].is_string());
}

fn status_uri(poll_url: &str) -> String {
    format!("/api/paynow/status?{}", serde_urlencoded::to_string([("poll_url", poll_url)]).unwrap())
}

#[tokio::test]
async fn status_relays_parsed_reply() {
    let server = MockServer::start_async().await;
    let poll_url = server.url("/Interface/CheckPayment/?guid=abc");
    let reply = signed_reply(&[
        ("status", "Paid"),
        ("reference", "ORD-1"),
        ("amount", "87.50"),
        ("paynowreference", "778899"),
        ("pollurl", poll_url.as_str()),
    ]);
    let poll = server
        .mock_async(|when, then| {
            when.method(POST).path("/Interface/CheckPayment/").query_param("guid", "abc");
            then.status(200).body(reply.clone());
        })
        .await;
    let app = app(GatewayConfig::for_upstream(&server.base_url()));

    let (status, _, body) = send(&app, raw_request("GET", &status_uri(&poll_url), "")).await;
    poll.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Paid");
    assert_eq!(body["reference"], "ORD-1");
    assert_eq!(body["amount"], "87.50");
    assert_eq!(body["paynowreference"], "778899");
    assert_eq!(body["pollurl"], poll_url);
    assert_eq!(body["hash"].as_str().unwrap().len(), 128);
}

#[tokio::test]
async fn status_omits_absent_fields() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/poll");
            then.status(200).body("status=Sent\nreference=ORD-2\n");
        })
        .await;
    let app = app(GatewayConfig::for_upstream(&server.base_url()));
    let (status, _, body) = send(&app, raw_request("GET", &status_uri(&server.url("/poll")), "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "Sent", "reference": "ORD-2"}));
}

#[tokio::test]
async fn status_requires_paynow_poll_url() {
    let app = app(GatewayConfig::for_upstream("https://www.paynow.co.zw"));

    let (status, _, body) = send(&app, raw_request("GET", "/api/paynow/status", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Poll URL is required");

    let (status, _, body) = send(&app, raw_request("GET", "/api/paynow/status?poll_url=", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_poll_url");

    let uri = status_uri("http://169.254.169.254/latest/meta-data");
    let (status, _, body) = send(&app, raw_request("GET", &uri, "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_poll_url");
}

#[tokio::test]
async fn status_rejects_repeated_poll_url_as_json() {
    let server = MockServer::start_async().await;
    let poll = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).body("status=Paid\n");
        })
        .await;
    let app = app(GatewayConfig::for_upstream(&server.base_url()));
    let uri = format!(
        "/api/paynow/status?poll_url={}&poll_url={}",
        server.url("/a"),
        server.url("/b")
    );
    let (status, headers, body) = send(&app, raw_request("GET", &uri, "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "invalid_query");
    assert_eq!(body["code"], "invalid_query");
    poll.assert_hits_async(0).await;
}

fn result_form(fields: &[(&str, &str)], hash: Option<&str>) -> String {
    let mut pairs: Vec<(&str, String)> = fields.iter().map(|(k, v)| (*k, v.to_string())).collect();
    if let Some(hash) = hash {
        pairs.push(("hash", hash.to_string()));
    }
    serde_urlencoded::to_string(&pairs).unwrap()
}

#[tokio::test]
async fn result_callback_verifies_hash() {
    let app = app(GatewayConfig::for_upstream("https://www.paynow.co.zw"));
    let fields = [
        ("reference", "ORD-1"),
        ("amount", "87.50"),
        ("paynowreference", "778899"),
        ("pollurl", "https://www.paynow.co.zw/Interface/CheckPayment/?guid=abc"),
        ("status", "Paid"),
    ];
    let hash = payment_gateway::paynow_hash(fields.iter().map(|(_, v)| *v), INTEGRATION_KEY);

    let req = raw_request("POST", "/api/paynow/result", result_form(&fields, Some(&hash)));
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let req = raw_request("POST", "/api/paynow/result", result_form(&fields, None));
    let (status, headers, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "sig_missing");

    let mut tampered = fields;
    tampered[1] = ("amount", "0.01");
    let req = raw_request("POST", "/api/paynow/result", result_form(&tampered, Some(&hash)));
    let (status, headers, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "sig_mismatch");
}
