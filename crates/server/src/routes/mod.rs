//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//!
//! # OAuth
//! GET  /auth                   - Start app installation OAuth
//! GET  /auth/callback          - Finish OAuth, register webhooks
//!
//! # Shopify
//! POST /webhooks               - Webhook deliveries
//! POST /graphql                - Admin GraphQL proxy (session token auth)
//!
//! # Front-end
//! GET  /_next/static/{*path}   - Assets, no login gate
//! GET  /_next/webpack-hmr      - Dev hot reload, no login gate
//! GET  /                       - Pages, login gate
//! GET  /{*path}                - Pages, login gate
//! ```

pub mod auth;
pub mod graphql;
pub mod pages;
pub mod webhooks;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::frame_ancestors_middleware;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", get(auth::begin))
        .route("/auth/callback", get(auth::callback))
}

/// Create the Shopify-facing API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks", post(webhooks::receive))
        .route("/graphql", post(graphql::proxy))
}

/// Create the front-end routes router.
///
/// Asset routes are matched before the page catch-all.
pub fn page_routes() -> Router<AppState> {
    let pages = Router::new()
        .route("/", get(pages::page))
        .route("/{*path}", get(pages::page))
        .layer(middleware::from_fn(frame_ancestors_middleware));

    Router::new()
        .route("/_next/static/{*path}", get(pages::asset))
        .route("/_next/webpack-hmr", get(pages::asset))
        .merge(pages)
}

/// Every route the server answers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth_routes())
        .merge(api_routes())
        .merge(page_routes())
}
