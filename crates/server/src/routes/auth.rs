//! Shopify app installation OAuth.
//!
//! - `GET /auth?shop=...` starts the handshake
//! - `GET /auth/callback` finishes it and runs the post-auth steps
//!
//! The `state` nonce is kept in the cookie session between the two. Any
//! callback that fails verification sends the merchant back to `/auth`.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use hookgate_core::ShopDomain;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, add_breadcrumb};
use crate::middleware::OAUTH_STATE_KEY;
use crate::services::AuthGrant;
use crate::sessions::ShopSession;
use crate::state::AppState;

/// Query parameters for `GET /auth`.
#[derive(Debug, Deserialize)]
pub struct BeginQuery {
    pub shop: Option<String>,
}

/// Generate a cryptographically secure random alphanumeric string.
fn generate_state(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Where a failed callback sends the merchant.
fn restart(shop: Option<&ShopDomain>) -> Response {
    let location = AppError::reauthorize_url(shop.map(ShopDomain::as_str));
    Redirect::to(&location).into_response()
}

/// Start the OAuth handshake.
///
/// # Route
///
/// `GET /auth`
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BeginQuery>,
) -> Result<Response, AppError> {
    let raw = query
        .shop
        .ok_or_else(|| AppError::BadRequest("Missing shop parameter".into()))?;
    let shop = ShopDomain::parse(&raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid shop parameter: {e}")))?;

    let nonce = generate_state(32);
    session
        .insert(OAUTH_STATE_KEY, &nonce)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store OAuth state: {e}")))?;

    let redirect_uri = format!("{}/auth/callback", state.config().shopify.app_url());
    let auth_url = state
        .oauth()
        .authorization_url(&shop, &redirect_uri, &nonce);

    tracing::info!(shop = %shop, "Starting OAuth");
    Ok(Redirect::to(&auth_url).into_response())
}

/// Finish the OAuth handshake.
///
/// Verifies the callback signature, shop and `state`, exchanges the code,
/// stores the session, then runs the post-auth steps. The merchant is
/// redirected into the app whatever the webhook registrations report.
///
/// # Route
///
/// `GET /auth/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let shop = params.get("shop").and_then(|s| ShopDomain::parse(s).ok());
    let Some(shop) = shop else {
        tracing::warn!("OAuth callback with missing or invalid shop");
        return restart(None);
    };

    if !state.oauth().verify_callback(&params) {
        tracing::warn!(shop = %shop, "OAuth callback signature mismatch");
        return restart(Some(&shop));
    }

    let stored_state: Option<String> = session.get(OAUTH_STATE_KEY).await.ok().flatten();
    if stored_state.is_none() || stored_state.as_ref() != params.get("state") {
        tracing::warn!(shop = %shop, "OAuth state mismatch");
        return restart(Some(&shop));
    }

    // One-time use
    if let Err(e) = session.remove::<String>(OAUTH_STATE_KEY).await {
        tracing::warn!(shop = %shop, error = %e, "Failed to clear OAuth state");
    }

    let Some(code) = params.get("code") else {
        tracing::warn!(shop = %shop, "OAuth callback missing code");
        return restart(Some(&shop));
    };

    let grant = match state.oauth().exchange_code(&shop, code).await {
        Ok(grant) => grant,
        Err(e) => {
            tracing::error!(shop = %shop, error = %e, "Failed to exchange OAuth code");
            return restart(Some(&shop));
        }
    };
    add_breadcrumb("oauth", "Exchanged code", Some(&[("shop", shop.as_str())]));

    state
        .sessions()
        .store(ShopSession::new(
            shop.as_str(),
            grant.access_token.clone(),
            &grant.scope,
        ))
        .await;

    let outcome = state
        .after_auth()
        .run(AuthGrant {
            shop: shop.into_inner(),
            access_token: grant.access_token,
            scope: grant.scope,
            host: params.get("host").cloned(),
        })
        .await;

    Redirect::to(&outcome.redirect_to).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state() {
        let a = generate_state(32);
        let b = generate_state(32);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
