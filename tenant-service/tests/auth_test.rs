mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn login_returns_a_bearer_token() {
    let app = TestApp::spawn().await;
    app.create_org("Acme", "a@x.com", "P1!").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/admin/login",
            Some(json!({ "email": "a@x.com", "password": "P1!" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn login_failures_share_one_message() {
    let app = TestApp::spawn().await;
    app.create_org("Acme", "a@x.com", "P1!").await;

    let mut messages = Vec::new();
    for (email, password) in [("a@x.com", "wrong"), ("ghost@x.com", "P1!")] {
        let (status, body) = app
            .request(
                Method::POST,
                "/admin/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        messages.push(body["error"].clone());
    }
    assert_eq!(messages[0], messages[1]);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::spawn().await;

    let (status, _) = app.request(Method::GET, "/org/get", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .request(Method::GET, "/org/get", None, Some("forged.token.value"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn superadmin_token_is_not_a_tenant_token() {
    let app = TestApp::spawn().await;
    let token = app.superadmin_token().await;

    let (status, _) = app.request(Method::GET, "/org/get", None, Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn superadmin_login_rejects_wrong_password() {
    let app = TestApp::spawn().await;
    let (status, _) = app
        .request(
            Method::POST,
            "/super/login",
            Some(json!({ "username": common::SUPERADMIN_USERNAME, "password": "guess" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
