//! Webhook subscription registration.
//!
//! After every completed OAuth handshake the app (re)subscribes the shop to
//! each monitored topic. Registrations run one at a time in
//! [`WebhookTopic::MONITORED`] order and are independent: a failed topic is
//! logged and the next one is still attempted. Nothing is retried.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hookgate_core::{DeliveryMethod, WebhookTopic};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::shopify::ShopifyError;

/// One topic registration for one shop.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct WebhookSubscriptionRequest {
    pub shop: String,
    pub access_token: SecretString,
    pub topic: WebhookTopic,
    pub delivery: DeliveryMethod,
}

impl std::fmt::Debug for WebhookSubscriptionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSubscriptionRequest")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("topic", &self.topic)
            .field("delivery", &self.delivery)
            .finish()
    }
}

/// Outcome of one topic registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscriptionResult {
    pub topic: WebhookTopic,
    pub success: bool,
    /// Whatever the collaborator returned, kept for logs.
    pub diagnostic: serde_json::Value,
}

/// Per-topic entry of a [`RegistrationResponse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicOutcome {
    /// Absent when the collaborator's payload is malformed.
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub result: serde_json::Value,
}

/// Raw registration payload, keyed by GraphQL topic name (`"ORDERS_CREATE"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationResponse(pub HashMap<String, TopicOutcome>);

impl RegistrationResponse {
    /// A response carrying a single topic's outcome.
    #[must_use]
    pub fn single(topic: WebhookTopic, success: bool, result: serde_json::Value) -> Self {
        Self(HashMap::from([(
            topic.graphql_name().to_string(),
            TopicOutcome {
                success: Some(success),
                result,
            },
        )]))
    }

    /// The entry for `topic`, if the payload has one.
    #[must_use]
    pub fn outcome(&self, topic: WebhookTopic) -> Option<&TopicOutcome> {
        self.0.get(topic.graphql_name())
    }

    /// Whether `topic` registered. A missing entry or flag counts as failure.
    #[must_use]
    pub fn succeeded(&self, topic: WebhookTopic) -> bool {
        self.outcome(topic)
            .and_then(|outcome| outcome.success)
            .unwrap_or(false)
    }
}

/// Errors from a subscription collaborator.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The platform call failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// The delivery method is not supported by this collaborator.
    #[error("unsupported delivery method: {0}")]
    UnsupportedDelivery(String),
}

/// Registers a webhook subscription with the delivery system.
#[async_trait]
pub trait SubscriptionClient: Send + Sync {
    async fn register(
        &self,
        request: &WebhookSubscriptionRequest,
    ) -> Result<RegistrationResponse, SubscriptionError>;
}

/// Drives registration of every monitored topic for a shop.
#[derive(Clone)]
pub struct WebhookSubscriptionManager {
    client: Arc<dyn SubscriptionClient>,
    destination: DeliveryMethod,
}

impl WebhookSubscriptionManager {
    #[must_use]
    pub fn new(client: Arc<dyn SubscriptionClient>, destination: DeliveryMethod) -> Self {
        Self {
            client,
            destination,
        }
    }

    /// Register every monitored topic for `shop`, in order, one at a time.
    ///
    /// Never short-circuits and never fails: each topic gets exactly one
    /// attempt and one result.
    #[instrument(
        skip(self, access_token),
        fields(delivery = self.destination.kind(), destination = %self.destination)
    )]
    pub async fn register_all(
        &self,
        shop: &str,
        access_token: &SecretString,
    ) -> Vec<WebhookSubscriptionResult> {
        let mut results = Vec::with_capacity(WebhookTopic::MONITORED.len());

        for topic in WebhookTopic::MONITORED {
            let request = WebhookSubscriptionRequest {
                shop: shop.to_string(),
                access_token: access_token.clone(),
                topic,
                delivery: self.destination.clone(),
            };

            let result = match self.client.register(&request).await {
                Ok(response) => {
                    let success = response.succeeded(topic);
                    let diagnostic = response.outcome(topic).map_or_else(
                        || serde_json::to_value(&response).unwrap_or_default(),
                        |outcome| outcome.result.clone(),
                    );
                    WebhookSubscriptionResult {
                        topic,
                        success,
                        diagnostic,
                    }
                }
                Err(e) => WebhookSubscriptionResult {
                    topic,
                    success: false,
                    diagnostic: serde_json::Value::String(e.to_string()),
                },
            };

            if result.success {
                tracing::info!(shop = %shop, topic = %topic, "Registered webhook");
            } else {
                tracing::warn!(
                    shop = %shop,
                    topic = %topic,
                    result = %result.diagnostic,
                    "Failed to register webhook"
                );
            }

            results.push(result);
        }

        results
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every request and answers from a per-topic script.
    struct ScriptedClient {
        calls: Mutex<Vec<WebhookTopic>>,
        script: fn(WebhookTopic) -> Result<RegistrationResponse, SubscriptionError>,
    }

    #[async_trait]
    impl SubscriptionClient for ScriptedClient {
        async fn register(
            &self,
            request: &WebhookSubscriptionRequest,
        ) -> Result<RegistrationResponse, SubscriptionError> {
            self.calls.lock().unwrap().push(request.topic);
            (self.script)(request.topic)
        }
    }

    fn manager(
        script: fn(WebhookTopic) -> Result<RegistrationResponse, SubscriptionError>,
    ) -> (WebhookSubscriptionManager, Arc<ScriptedClient>) {
        let client = Arc::new(ScriptedClient {
            calls: Mutex::new(Vec::new()),
            script,
        });
        let destination = DeliveryMethod::parse("pubsub://project:topic").unwrap();
        (
            WebhookSubscriptionManager::new(client.clone(), destination),
            client,
        )
    }

    fn token() -> SecretString {
        SecretString::from("shpat_token")
    }

    #[tokio::test]
    async fn test_registers_all_topics_in_order() {
        let (manager, client) =
            manager(|topic| Ok(RegistrationResponse::single(topic, true, serde_json::Value::Null)));

        let results = manager.register_all("a.myshopify.com", &token()).await;

        assert_eq!(
            *client.calls.lock().unwrap(),
            WebhookTopic::MONITORED.to_vec()
        );
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.success));
        let order: Vec<_> = results.iter().map(|r| r.topic).collect();
        assert_eq!(order, WebhookTopic::MONITORED.to_vec());
    }

    #[tokio::test]
    async fn test_failure_does_not_short_circuit() {
        let (manager, client) = manager(|topic| match topic {
            WebhookTopic::OrdersCreate => Ok(RegistrationResponse::single(
                topic,
                false,
                serde_json::json!({"userErrors": [{"message": "denied"}]}),
            )),
            WebhookTopic::CartsCreate => Err(SubscriptionError::UnsupportedDelivery("x".into())),
            _ => Ok(RegistrationResponse::single(topic, true, serde_json::Value::Null)),
        });

        let results = manager.register_all("a.myshopify.com", &token()).await;

        assert_eq!(client.calls.lock().unwrap().len(), 6);
        let failed: Vec<_> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.topic)
            .collect();
        assert_eq!(
            failed,
            vec![WebhookTopic::OrdersCreate, WebhookTopic::CartsCreate]
        );
        assert_eq!(
            results[1].diagnostic,
            serde_json::json!({"userErrors": [{"message": "denied"}]})
        );
        assert_eq!(
            results[3].diagnostic,
            serde_json::json!("unsupported delivery method: x")
        );
    }

    #[tokio::test]
    async fn test_missing_topic_entry_is_failure() {
        let (manager, _) = manager(|_| Ok(RegistrationResponse::default()));

        let results = manager.register_all("a.myshopify.com", &token()).await;

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn test_missing_success_flag_is_failure() {
        let (manager, _) = manager(|topic| {
            let json = serde_json::json!({ topic.graphql_name(): { "result": "odd" } });
            Ok(serde_json::from_value(json).unwrap())
        });

        let results = manager.register_all("a.myshopify.com", &token()).await;

        assert!(results.iter().all(|r| !r.success));
        assert_eq!(results[0].diagnostic, serde_json::json!("odd"));
    }

    #[test]
    fn test_succeeded_reads_only_own_topic() {
        let response = RegistrationResponse::single(
            WebhookTopic::CartsUpdate,
            true,
            serde_json::Value::Null,
        );
        assert!(response.succeeded(WebhookTopic::CartsUpdate));
        assert!(!response.succeeded(WebhookTopic::CartsCreate));
    }

    #[test]
    fn test_request_debug_redacts_token() {
        let request = WebhookSubscriptionRequest {
            shop: "a.myshopify.com".to_string(),
            access_token: SecretString::from("shpat_visible_if_leaked"),
            topic: WebhookTopic::OrdersCreate,
            delivery: DeliveryMethod::parse("pubsub://p:t").unwrap(),
        };
        let output = format!("{request:?}");
        assert!(!output.contains("shpat_visible_if_leaked"));
    }
}
