//! Admin GraphQL proxy endpoint for the embedded front-end.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Response, header},
    response::IntoResponse,
};
use tracing::instrument;

use crate::error::AppError;
use crate::shopify::ShopifyError;
use crate::state::AppState;

/// Forward a GraphQL request under the shop's stored access token.
///
/// Asks App Bridge to reauthorize when the session token is missing or
/// invalid, when no session is stored for the shop, when the configured
/// scopes grew since the shop installed, or when Shopify rejects the token.
///
/// # Route
///
/// `POST /graphql`
#[instrument(skip(state, headers, body))]
pub async fn proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let claims = state
        .session_tokens()
        .verify_header(authorization)
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected session token");
            AppError::Reauthorize { shop: None }
        })?;
    let shop = claims.shop.into_inner();

    let session = state
        .sessions()
        .load(&shop)
        .await
        .ok_or_else(|| AppError::Reauthorize {
            shop: Some(shop.clone()),
        })?;

    if !session.covers(&state.config().shopify.scopes) {
        tracing::info!(shop = %shop, "Granted scopes no longer cover configured scopes");
        return Err(AppError::Reauthorize { shop: Some(shop) });
    }

    let upstream = match state.graphql().proxy(&session, body).await {
        Ok(upstream) => upstream,
        Err(ShopifyError::Unauthorized(_)) => {
            state.sessions().delete(&shop).await;
            return Err(AppError::Reauthorize { shop: Some(shop) });
        }
        Err(e) => return Err(e.into()),
    };

    let mut response = Response::builder().status(upstream.status);
    if let Some(content_type) = upstream.content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(upstream.body))
        .map_err(|e| AppError::Internal(format!("Failed to build proxy response: {e}")))
}
