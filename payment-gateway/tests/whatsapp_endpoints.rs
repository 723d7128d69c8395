mod support;

use axum::http::StatusCode;
use httpmock::prelude::*;
use payment_gateway::config::WhatsAppConfig;
use payment_gateway::GatewayConfig;
use serde_json::json;
use support::{app, json_post, send};

fn live_config(graph_url: String) -> GatewayConfig {
    GatewayConfig::for_upstream("https://www.paynow.co.zw").with_whatsapp(WhatsAppConfig {
        access_token: "wa-token".into(),
        phone_number_id: "PHONE-ID".into(),
        graph_url,
    })
}

#[tokio::test]
async fn unconfigured_sender_logs_message() {
    let app = app(GatewayConfig::for_upstream("https://www.paynow.co.zw"));
    let body = json!({"to": "263771234567", "message": "Order ORD-1 confirmed", "orderId": "ORD-1"});
    let (status, _, body) = send(&app, json_post("/api/whatsapp/send-message", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "message": "Message logged (WhatsApp API not configured)",
            "to": "263771234567",
            "orderId": "ORD-1"
        })
    );
}

#[tokio::test]
async fn missing_recipient_or_text_is_rejected() {
    let app = app(GatewayConfig::for_upstream("https://www.paynow.co.zw"));
    for body in [json!({"message": "hi"}), json!({"to": "263771234567"}), json!({"to": "", "message": "hi"})] {
        let (status, _, resp) = send(&app, json_post("/api/whatsapp/send-message", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "Phone number and message are required");
    }
}

#[tokio::test]
async fn live_sender_returns_message_id() {
    let server = MockServer::start_async().await;
    let graph = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v18.0/PHONE-ID/messages")
                .header("authorization", "Bearer wa-token")
                .body_contains("\"messaging_product\":\"whatsapp\"");
            then.status(200).json_body(json!({"messages": [{"id": "wamid.HBg"}]}));
        })
        .await;
    let app = app(live_config(server.base_url()));
    let body = json!({"to": "263771234567", "message": "hello", "orderId": "ORD-9"});
    let (status, _, body) = send(&app, json_post("/api/whatsapp/send-message", body)).await;
    graph.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["messageId"], "wamid.HBg");
    assert_eq!(body["orderId"], "ORD-9");
}

#[tokio::test]
async fn live_sender_relays_graph_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v18.0/PHONE-ID/messages");
            then.status(400).json_body(json!({"error": {"message": "Invalid parameter"}}));
        })
        .await;
    let app = app(live_config(server.base_url()));
    let body = json!({"to": "nope", "message": "hello"});
    let (status, _, body) = send(&app, json_post("/api/whatsapp/send-message", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "WhatsApp message failed");
    assert_eq!(body["details"]["error"]["message"], "Invalid parameter");
}
