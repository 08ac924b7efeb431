//! Shopify platform adapters.
//!
//! Everything that talks to Shopify lives here, behind the traits the rest of
//! the server depends on:
//!
//! - [`oauth`] - OAuth authorization URL, callback HMAC check, code exchange
//! - [`subscriptions`] - Webhook subscription registration over the Admin GraphQL API
//! - [`graphql`] - Verbatim Admin GraphQL proxy for the embedded front-end
//! - [`session_token`] - App Bridge session token (JWT) verification
//! - [`signature`] - HMAC helpers shared by OAuth and webhook delivery

pub mod graphql;
pub mod oauth;
pub mod session_token;
pub mod signature;
pub mod subscriptions;

pub use graphql::{GraphqlProxy, ProxyResponse, ShopifyGraphqlProxy};
pub use oauth::{AccessGrant, OAuthClient, ShopifyOAuthClient};
pub use session_token::{SessionClaims, SessionTokenError, SessionTokenVerifier};
pub use subscriptions::ShopifySubscriptionClient;

use thiserror::Error;

/// Errors that can occur when interacting with Shopify.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<graphql_client::Error>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// OAuth token exchange failed.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

fn format_graphql_errors(errors: &[graphql_client::Error]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Admin GraphQL endpoint for a shop.
#[must_use]
pub fn admin_graphql_url(shop: &str, api_version: &str) -> String {
    format!("https://{shop}/admin/api/{api_version}/graphql.json")
}
