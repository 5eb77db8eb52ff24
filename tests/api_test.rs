//! HTTP 接口测试（tower oneshot，不绑定端口）

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{build_state, test_config, FakeWallet, MockRpc, ScriptedConnector, ACCOUNT_A};
use serde_json::Value;
use tower::ServiceExt;
use usdt_board::api;

const SECURE_URL: &str = "https://board.example.com";

async fn app(public_url: &str) -> (Router, MockRpc) {
    let mock = MockRpc::start().await;
    mock.update(|s| s.balance = Some(2_500_000));
    let state = build_state(
        test_config(&mock.url, public_url),
        ScriptedConnector::new(FakeWallet::new(1, &[ACCOUNT_A])),
    );
    (api::routes(state), mock)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, method, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn test_index_page() {
    let (app, _mock) = app(SECURE_URL).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));

    let (_, html) = send(&app, "GET", "/").await;
    assert!(html.contains(r#"id="btn-connect""#));
    assert!(html.contains(r#"<div id="connected" hidden>"#));
    assert!(!html.contains("alert-error-https"));
}

#[tokio::test]
async fn test_form_connect_redirects_and_renders() {
    let (app, _mock) = app(SECURE_URL).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/connect")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let (_, html) = send(&app, "GET", "/").await;
    assert!(html.contains(&format!(
        r#"<strong id="selected-account">{}</strong>"#,
        ACCOUNT_A
    )));
    assert!(html.contains("<td class=\"balance\">2.500000</td>"));
    assert!(html.contains(r#"<div id="prepare" hidden>"#));

    let (status, _) = send(&app, "POST", "/disconnect").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let (_, state) = send_json(&app, "GET", "/api/state").await;
    assert_eq!(state["data"]["state"], "disconnected");
}

#[tokio::test]
async fn test_api_connect_and_state() {
    let (app, _mock) = app(SECURE_URL).await;

    let (status, body) = send_json(&app, "POST", "/api/connect").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["state"], "connected");
    assert_eq!(body["data"]["rows"][0]["balance"], "2.500000");
    assert_eq!(body["data"]["rows"][0]["usd"], "2.50");

    let (_, state) = send_json(&app, "GET", "/api/state").await;
    assert_eq!(state["data"]["selected_account"], ACCOUNT_A);

    let (status, body) = send_json(&app, "POST", "/api/connect").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "wallet_busy");
}

#[tokio::test]
async fn test_api_connect_insecure() {
    let (app, _mock) = app("http://board.example.com").await;

    let (status, body) = send_json(&app, "POST", "/api/connect").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "insecure_transport");

    let (_, html) = send(&app, "GET", "/").await;
    assert!(html.contains(r#"id="alert-error-https""#));
}

#[tokio::test]
async fn test_api_disconnect_without_session() {
    let (app, _mock) = app(SECURE_URL).await;

    let (status, body) = send_json(&app, "POST", "/api/disconnect").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "disconnected");
}

#[tokio::test]
async fn test_api_refresh_requires_session() {
    let (app, _mock) = app(SECURE_URL).await;

    let (status, body) = send_json(&app, "POST", "/api/refresh").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "wallet_disconnected");
}

#[tokio::test]
async fn test_list_chains() {
    let (app, _mock) = app(SECURE_URL).await;

    let (status, body) = send_json(&app, "GET", "/api/chains").await;
    assert_eq!(status, StatusCode::OK);

    let chains = body["data"].as_array().unwrap();
    let ids: Vec<u64> = chains
        .iter()
        .map(|c| c["chain_id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 56, 137, 42161]);
    assert_eq!(chains[0]["name"], "Ethereum");
    assert_eq!(chains[0]["displayed"], true);
    assert_eq!(chains[1]["displayed"], false);
}

#[tokio::test]
async fn test_healthz() {
    let (app, _mock) = app(SECURE_URL).await;

    let (status, body) = send_json(&app, "GET", "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["wallet_state"], "disconnected");
    assert_eq!(body["secure_transport"], true);
}
