use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use directory_relay::comms::{create_router, AppState};
use directory_relay::config::{Config, DiscordConfig, GoogleConfig};
use ed25519_dalek::{Signer, SigningKey};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const PRIVATE_KEY: &str = include_str!("fixtures/service_account_key.pem");
const TS: &str = "1700000000";

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

// Outbound endpoints point at a closed port; none of these tests reach them.
fn test_config(skip_verify: bool) -> Config {
    Config {
        discord: DiscordConfig {
            public_key: hex::encode(signing_key().verifying_key().as_bytes()),
            bot_token: "bot-token".to_string(),
            app_id: "app-1".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
        },
        google: GoogleConfig {
            client_email: "relay@project.iam.gserviceaccount.com".to_string(),
            private_key: PRIVATE_KEY.to_string(),
            subject: None,
            customer: "my_customer".to_string(),
            scopes: Vec::new(),
            token_url: "http://127.0.0.1:9/token".to_string(),
            api_base: "http://127.0.0.1:9/directory".to_string(),
        },
        skip_verify,
    }
}

fn test_router(skip_verify: bool) -> Router {
    let state = Arc::new(AppState::from_config(&test_config(skip_verify)).unwrap());
    create_router(state)
}

fn signed_request(body: &str) -> Request<Body> {
    let mut message = TS.as_bytes().to_vec();
    message.extend_from_slice(body.as_bytes());
    let signature = hex::encode(signing_key().sign(&message).to_bytes());
    Request::builder()
        .method("POST")
        .uri("/interactions")
        .header("content-type", "application/json")
        .header("X-Signature-Ed25519", signature)
        .header("X-Signature-Timestamp", TS)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_router(false)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_unsigned_request_is_unauthorized() {
    let response = test_router(false)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/interactions")
                .body(Body::from(r#"{"type":1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_body_is_unauthorized() {
    let mut request = signed_request(r#"{"type":1}"#);
    *request.body_mut() = Body::from(r#"{"type":2}"#);

    let response = test_router(false).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signed_ping_is_ponged() {
    let response = test_router(false)
        .oneshot(signed_request(r#"{"type":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body, json!({"type": 1}));
}

#[tokio::test]
async fn test_signed_garbage_is_bad_request() {
    let response = test_router(false)
        .oneshot(signed_request("not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_skip_verify_accepts_unsigned_ping() {
    let response = test_router(true)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/interactions")
                .body(Body::from(r#"{"type":1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["type"], 1);
}

#[tokio::test]
async fn test_missing_email_gets_ephemeral_reply() {
    let response = test_router(false)
        .oneshot(signed_request(r#"{"type":2,"id":"i","token":"t","data":{"name":"user"}}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["type"], 4);
    assert_eq!(body["data"]["flags"], 64);
    assert!(body["data"]["content"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn test_unsupported_interaction_type() {
    let response = test_router(false)
        .oneshot(signed_request(r#"{"type":3}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = test_router(false)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
