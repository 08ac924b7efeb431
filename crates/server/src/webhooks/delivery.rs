//! Inbound webhook deliveries.
//!
//! A delivery is authenticated by `X-Shopify-Hmac-Sha256`, the base64
//! HMAC-SHA256 of the raw body under the app's API secret, and routed by its
//! `X-Shopify-Topic` header to the handler installed for that topic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use hookgate_core::{ShopDomain, WebhookTopic};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use crate::registry::ShopRegistry;
use crate::shopify::signature;

pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
pub const TOPIC_HEADER: &str = "x-shopify-topic";
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";
pub const WEBHOOK_ID_HEADER: &str = "x-shopify-webhook-id";

/// Why a delivery was not handled.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("invalid shop domain: {0}")]
    InvalidShop(String),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("no handler installed for {0}")]
    NoHandler(WebhookTopic),

    #[error("handler for {topic} failed: {message}")]
    Handler {
        topic: WebhookTopic,
        message: String,
    },
}

impl WebhookError {
    /// Status returned to the delivery system.
    ///
    /// Malformed deliveries get 400 and forged ones 401. Failures on our side
    /// still acknowledge with 200 so the platform does not retry into them.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::InvalidShop(_) | Self::UnknownTopic(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::NoHandler(_) | Self::Handler { .. } => StatusCode::OK,
        }
    }
}

/// A verified webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub topic: WebhookTopic,
    pub shop: ShopDomain,
    pub webhook_id: Option<String>,
    pub body: Bytes,
}

impl WebhookDelivery {
    /// The body as JSON, if it parses.
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Reacts to a verified delivery.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, delivery: &WebhookDelivery) -> Result<(), WebhookError>;
}

/// Drops the shop from the registry so its next page load re-runs OAuth.
pub struct InvalidateShop {
    registry: ShopRegistry,
}

impl InvalidateShop {
    #[must_use]
    pub const fn new(registry: ShopRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl WebhookHandler for InvalidateShop {
    async fn handle(&self, delivery: &WebhookDelivery) -> Result<(), WebhookError> {
        let removed = self
            .registry
            .invalidate(delivery.shop.as_str())
            .await
            .map_err(|e| WebhookError::Handler {
                topic: delivery.topic,
                message: e.to_string(),
            })?;

        tracing::info!(
            shop = %delivery.shop,
            topic = %delivery.topic,
            removed,
            "Invalidated shop after webhook"
        );
        Ok(())
    }
}

/// Verifies deliveries and dispatches them by topic.
#[derive(Clone)]
pub struct WebhookProcessor {
    secret: SecretString,
    handlers: HashMap<WebhookTopic, Arc<dyn WebhookHandler>>,
}

impl WebhookProcessor {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            handlers: HashMap::new(),
        }
    }

    /// Install `handler` for `topic`, replacing any previous one.
    #[must_use]
    pub fn with_handler(mut self, topic: WebhookTopic, handler: Arc<dyn WebhookHandler>) -> Self {
        self.handlers.insert(topic, handler);
        self
    }

    /// A processor that invalidates the shop on every monitored topic.
    #[must_use]
    pub fn monitored(secret: SecretString, registry: &ShopRegistry) -> Self {
        let invalidate: Arc<dyn WebhookHandler> = Arc::new(InvalidateShop::new(registry.clone()));
        WebhookTopic::MONITORED
            .into_iter()
            .fold(Self::new(secret), |processor, topic| {
                processor.with_handler(topic, Arc::clone(&invalidate))
            })
    }

    /// Whether a handler is installed for `topic`.
    #[must_use]
    pub fn handles(&self, topic: WebhookTopic) -> bool {
        self.handlers.contains_key(&topic)
    }

    /// Verify and dispatch one delivery.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError` when the delivery is malformed, its signature
    /// does not verify, or its handler fails.
    #[instrument(skip_all)]
    pub async fn process(
        &self,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<WebhookDelivery, WebhookError> {
        let provided = header(headers, HMAC_HEADER)?;
        if !signature::verify_body(&body, provided, self.secret.expose_secret()) {
            return Err(WebhookError::InvalidSignature);
        }

        let raw_topic = header(headers, TOPIC_HEADER)?;
        let topic: WebhookTopic = raw_topic
            .parse()
            .map_err(|_| WebhookError::UnknownTopic(raw_topic.to_string()))?;

        let raw_shop = header(headers, SHOP_DOMAIN_HEADER)?;
        let shop = ShopDomain::parse(raw_shop)
            .map_err(|_| WebhookError::InvalidShop(raw_shop.to_string()))?;

        let delivery = WebhookDelivery {
            topic,
            shop,
            webhook_id: headers
                .get(WEBHOOK_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        };

        let handler = self
            .handlers
            .get(&topic)
            .ok_or(WebhookError::NoHandler(topic))?;
        handler.handle(&delivery).await?;

        Ok(delivery)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(WebhookError::MissingHeader(name))
}
