//! Webhook delivery endpoint.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::instrument;

use crate::state::AppState;

/// Receive a webhook delivery.
///
/// Always answers; delivery problems map to 400/401 and handler failures are
/// acknowledged with 200 so the platform does not redeliver into them.
///
/// # Route
///
/// `POST /webhooks`
#[instrument(skip(state, headers, body))]
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    match state.webhooks().process(&headers, body).await {
        Ok(delivery) => {
            tracing::info!(
                topic = %delivery.topic,
                shop = %delivery.shop,
                webhook_id = ?delivery.webhook_id,
                "Webhook processed"
            );
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to process webhook");
            e.status()
        }
    }
}
