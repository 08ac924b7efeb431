//! Admin GraphQL proxy for the embedded front-end.
//!
//! The front-end's queries are forwarded verbatim under the shop's offline
//! access token; the response status and body come back untouched.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use tracing::instrument;

use super::{ShopifyError, admin_graphql_url};
use crate::sessions::ShopSession;

/// Upstream GraphQL response.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Forwards a GraphQL request body to the shop's Admin API.
#[async_trait]
pub trait GraphqlProxy: Send + Sync {
    async fn proxy(
        &self,
        session: &ShopSession,
        body: Bytes,
    ) -> Result<ProxyResponse, ShopifyError>;
}

/// [`GraphqlProxy`] posting to `/admin/api/<version>/graphql.json`.
#[derive(Clone)]
pub struct ShopifyGraphqlProxy {
    client: reqwest::Client,
    api_version: String,
}

impl ShopifyGraphqlProxy {
    #[must_use]
    pub const fn new(client: reqwest::Client, api_version: String) -> Self {
        Self {
            client,
            api_version,
        }
    }
}

#[async_trait]
impl GraphqlProxy for ShopifyGraphqlProxy {
    #[instrument(skip(self, session, body), fields(shop = %session.shop, bytes = body.len()))]
    async fn proxy(
        &self,
        session: &ShopSession,
        body: Bytes,
    ) -> Result<ProxyResponse, ShopifyError> {
        let endpoint = admin_graphql_url(&session.shop, &self.api_version);

        let response = self
            .client
            .post(&endpoint)
            .header("X-Shopify-Access-Token", session.token())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        // A revoked token must send the merchant back through OAuth.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(ProxyResponse {
            status,
            content_type,
            body,
        })
    }
}
