//! Hookgate server library.
//!
//! Backend for a Shopify embedded app: OAuth installation, webhook
//! subscription and delivery, an Admin GraphQL proxy, and a login gate in
//! front of the page renderer. Exposed as a library so the router can be
//! driven in tests with substitute collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod render;
pub mod routes;
pub mod services;
pub mod sessions;
pub mod shopify;
pub mod state;
pub mod webhooks;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the application router with its middleware stack.
///
/// Sentry layers are added by the binary, outermost.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config().environment);

    routes::routes()
        .layer(session_layer)
        .layer(axum::middleware::from_fn(
            middleware::request_context_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        shop = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
