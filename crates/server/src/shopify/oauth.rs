//! Shopify OAuth (authorization code grant) for app installation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use hookgate_core::ShopDomain;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{ShopifyError, signature};
use crate::config::ShopifyAppConfig;

/// Access token granted by a completed OAuth handshake.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct AccessGrant {
    /// Admin API access token.
    pub access_token: SecretString,
    /// Comma-separated granted scopes.
    pub scope: String,
}

impl std::fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrant")
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// The OAuth handshake with the platform.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// URL the merchant is sent to in order to approve the app.
    fn authorization_url(&self, shop: &ShopDomain, redirect_uri: &str, state: &str) -> String;

    /// Whether the callback query carries a valid signature.
    fn verify_callback(&self, params: &BTreeMap<String, String>) -> bool;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessGrant, ShopifyError>;
}

/// OAuth token response from Shopify.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    scope: String,
}

/// [`OAuthClient`] backed by Shopify's `/admin/oauth` endpoints.
pub struct ShopifyOAuthClient {
    client: reqwest::Client,
    api_key: String,
    api_secret: SecretString,
    scopes: Vec<String>,
}

impl ShopifyOAuthClient {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &ShopifyAppConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            scopes: config.scopes.clone(),
        }
    }
}

#[async_trait]
impl OAuthClient for ShopifyOAuthClient {
    fn authorization_url(&self, shop: &ShopDomain, redirect_uri: &str, state: &str) -> String {
        let scope = self.scopes.join(",");
        format!(
            "https://{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            shop,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&scope),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    fn verify_callback(&self, params: &BTreeMap<String, String>) -> bool {
        signature::verify_query(params, self.api_secret.expose_secret())
    }

    #[instrument(skip(self, code), fields(shop = %shop))]
    async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessGrant, ShopifyError> {
        let url = format!("https://{shop}/admin/oauth/access_token");

        let params = [
            ("client_id", self.api_key.as_str()),
            ("client_secret", self.api_secret.expose_secret()),
            ("code", code),
        ];

        let response = self.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!(
                "Token exchange failed ({status}): {text}"
            )));
        }

        let token: OAuthTokenResponse = response.json().await?;

        Ok(AccessGrant {
            access_token: SecretString::from(token.access_token),
            scope: token.scope,
        })
    }
}
