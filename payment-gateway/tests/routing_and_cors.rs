mod support;

use axum::http::StatusCode;
use payment_gateway::GatewayConfig;
use support::{app, raw_request, send};

const ENDPOINTS: [(&str, &str); 6] = [
    ("/api/paynow/initiate", "POST"),
    ("/api/paynow/status", "GET"),
    ("/api/paynow/result", "POST"),
    ("/api/paypal/create-order", "POST"),
    ("/api/whatsapp/send-message", "POST"),
    ("/api/checkout", "POST"),
];

#[tokio::test]
async fn preflight_answers_with_permissive_cors() {
    let app = app(GatewayConfig::for_upstream("https://www.paynow.co.zw"));
    for (path, method) in ENDPOINTS {
        let req = axum::http::Request::builder()
            .uri(path)
            .method("OPTIONS")
            .header("Origin", "https://shop.example")
            .header("Access-Control-Request-Method", method)
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, headers, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*", "{path}");
        let methods = headers.get("access-control-allow-methods").unwrap().to_str().unwrap();
        assert!(methods.contains(method), "{path}: {methods}");
        let allowed = headers.get("access-control-allow-headers").unwrap().to_str().unwrap();
        assert!(allowed.eq_ignore_ascii_case("content-type"), "{path}: {allowed}");
    }
}

#[tokio::test]
async fn wrong_method_is_json_405() {
    let app = app(GatewayConfig::for_upstream("https://www.paynow.co.zw"));
    for (path, method) in ENDPOINTS {
        let wrong = if method == "GET" { "DELETE" } else { "GET" };
        let (status, headers, body) = send(&app, raw_request(wrong, path, "")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{wrong} {path}");
        assert_eq!(body["error"], "Method not allowed");
        assert_eq!(headers.get("X-Error-Code").unwrap(), "method_not_allowed");
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
    }

    let (status, _, _) = send(&app, raw_request("PUT", "/api/paypal/capture-order/ABC", "")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn health_and_metrics_are_served() {
    let app = app(GatewayConfig::for_upstream("https://www.paynow.co.zw"));
    let (status, _, body) = send(&app, raw_request("GET", "/healthz", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    // one request so the counter family is present
    let _ = send(&app, raw_request("POST", "/api/whatsapp/send-message", r#"{"to":"1","message":"m"}"#)).await;
    let (status, headers, body) = send(&app, raw_request("GET", "/metrics", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get("content-type").unwrap().to_str().unwrap().starts_with("text/plain"));
    let text = body.as_str().unwrap();
    assert!(text.contains("gateway_upstream_requests_total"), "{text}");
    assert!(text.contains("provider=\"whatsapp\""), "{text}");
}
