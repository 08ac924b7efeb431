//! Admin GraphQL proxy through the router.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use hookgate_integration_tests::{
    ACCESS_TOKEN, API_SECRET, TestApp, TestOptions, body_text, session_token,
};

const SHOP: &str = "a-shop.myshopify.com";
const QUERY: &str = r#"{"query":"{ shop { name } }"}"#;
const REAUTHORIZE: &str = "x-shopify-api-request-failure-reauthorize";
const REAUTHORIZE_URL: &str = "x-shopify-api-request-failure-reauthorize-url";

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn test_proxies_with_stored_token() {
    let app = TestApp::new();
    app.authenticate(SHOP).await;
    let auth = bearer(&session_token(SHOP, API_SECRET));

    let response = app
        .post("/graphql", QUERY, &[("authorization", &auth)])
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(body_text(response).await, QUERY);
    assert_eq!(
        app.journal.matching("graphql"),
        vec![format!("graphql {SHOP} {ACCESS_TOKEN}")]
    );
}

#[tokio::test]
async fn test_missing_token_requests_reauthorization() {
    let app = TestApp::new();

    let response = app.post("/graphql", QUERY, &[]).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[REAUTHORIZE], "1");
    assert_eq!(response.headers()[REAUTHORIZE_URL], "/auth");
}

#[tokio::test]
async fn test_forged_token_requests_reauthorization() {
    let app = TestApp::new();
    app.authenticate(SHOP).await;
    let auth = bearer(&session_token(SHOP, "someone-elses-secret"));

    let response = app
        .post("/graphql", QUERY, &[("authorization", &auth)])
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.journal.matching("graphql").is_empty());
}

#[tokio::test]
async fn test_shop_without_session_requests_reauthorization() {
    let app = TestApp::new();
    let auth = bearer(&session_token(SHOP, API_SECRET));

    let response = app
        .post("/graphql", QUERY, &[("authorization", &auth)])
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.headers()[REAUTHORIZE_URL],
        format!("/auth?shop={SHOP}").as_str()
    );
}

#[tokio::test]
async fn test_revoked_token_requests_reauthorization() {
    let app = TestApp::build(TestOptions {
        reject_graphql_token: true,
        ..TestOptions::default()
    });
    app.authenticate(SHOP).await;
    let auth = bearer(&session_token(SHOP, API_SECRET));

    let response = app
        .post("/graphql", QUERY, &[("authorization", &auth)])
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.state.sessions().load(SHOP).await.is_none());
}
