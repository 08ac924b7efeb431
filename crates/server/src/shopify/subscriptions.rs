//! Webhook subscriptions over the Admin GraphQL API.
//!
//! Registration first looks up the shop's existing subscription for the
//! topic. A subscription already pointing at the destination is reported as
//! registered without a write; a subscription pointing elsewhere is updated in
//! place; otherwise a new one is created.

use async_trait::async_trait;
use graphql_client::{QueryBody, Response};
use hookgate_core::{DeliveryMethod, WebhookTopic};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use super::{ShopifyError, admin_graphql_url};
use crate::webhooks::{
    RegistrationResponse, SubscriptionClient, SubscriptionError, WebhookSubscriptionRequest,
};

/// Build a create or update mutation. The payload is aliased to `result` so
/// every variant deserializes into [`MutationData`].
macro_rules! subscription_mutation {
    (create $op:literal, $field:literal, $input:literal) => {
        concat!(
            "mutation ",
            $op,
            "($topic: WebhookSubscriptionTopic!, $webhookSubscription: ",
            $input,
            "!) { result: ",
            $field,
            "(topic: $topic, webhookSubscription: $webhookSubscription) ",
            "{ userErrors { field message } webhookSubscription { id } } }"
        )
    };
    (update $op:literal, $field:literal, $input:literal) => {
        concat!(
            "mutation ",
            $op,
            "($id: ID!, $webhookSubscription: ",
            $input,
            "!) { result: ",
            $field,
            "(id: $id, webhookSubscription: $webhookSubscription) ",
            "{ userErrors { field message } webhookSubscription { id } } }"
        )
    };
}

const EXISTING_SUBSCRIPTION: &str = concat!(
    "query ExistingWebhookSubscription($topic: WebhookSubscriptionTopic!) { ",
    "webhookSubscriptions(first: 1, topics: [$topic]) { edges { node { id endpoint { ",
    "__typename ",
    "... on WebhookHttpEndpoint { callbackUrl } ",
    "... on WebhookEventBridgeEndpoint { arn } ",
    "... on WebhookPubSubEndpoint { pubSubProject pubSubTopic } ",
    "} } } } }"
);

const HTTP_CREATE: &str = subscription_mutation!(
    create "WebhookSubscriptionCreate",
    "webhookSubscriptionCreate",
    "WebhookSubscriptionInput"
);
const HTTP_UPDATE: &str = subscription_mutation!(
    update "WebhookSubscriptionUpdate",
    "webhookSubscriptionUpdate",
    "WebhookSubscriptionInput"
);
const PUBSUB_CREATE: &str = subscription_mutation!(
    create "PubSubWebhookSubscriptionCreate",
    "pubSubWebhookSubscriptionCreate",
    "PubSubWebhookSubscriptionInput"
);
const PUBSUB_UPDATE: &str = subscription_mutation!(
    update "PubSubWebhookSubscriptionUpdate",
    "pubSubWebhookSubscriptionUpdate",
    "PubSubWebhookSubscriptionInput"
);
const EVENTBRIDGE_CREATE: &str = subscription_mutation!(
    create "EventBridgeWebhookSubscriptionCreate",
    "eventBridgeWebhookSubscriptionCreate",
    "EventBridgeWebhookSubscriptionInput"
);
const EVENTBRIDGE_UPDATE: &str = subscription_mutation!(
    update "EventBridgeWebhookSubscriptionUpdate",
    "eventBridgeWebhookSubscriptionUpdate",
    "EventBridgeWebhookSubscriptionInput"
);

// =============================================================================
// Response shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct ExistingData {
    #[serde(rename = "webhookSubscriptions")]
    webhook_subscriptions: Connection,
}

#[derive(Debug, Deserialize)]
struct Connection {
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: ExistingSubscription,
}

#[derive(Debug, Deserialize)]
struct ExistingSubscription {
    id: String,
    endpoint: Endpoint,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum Endpoint {
    WebhookHttpEndpoint {
        #[serde(rename = "callbackUrl")]
        callback_url: String,
    },
    WebhookEventBridgeEndpoint { arn: String },
    WebhookPubSubEndpoint {
        #[serde(rename = "pubSubProject")]
        pub_sub_project: String,
        #[serde(rename = "pubSubTopic")]
        pub_sub_topic: String,
    },
}

impl Endpoint {
    fn into_delivery(self) -> DeliveryMethod {
        match self {
            Self::WebhookHttpEndpoint { callback_url } => DeliveryMethod::Http { callback_url },
            Self::WebhookEventBridgeEndpoint { arn } => DeliveryMethod::EventBridge { arn },
            Self::WebhookPubSubEndpoint {
                pub_sub_project,
                pub_sub_topic,
            } => DeliveryMethod::PubSub {
                project: pub_sub_project,
                topic: pub_sub_topic,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct MutationData {
    result: MutationPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MutationPayload {
    #[serde(rename = "userErrors", default)]
    user_errors: Vec<UserError>,
    #[serde(rename = "webhookSubscription")]
    webhook_subscription: Option<SubscriptionId>,
}

impl MutationPayload {
    fn succeeded(&self) -> bool {
        self.user_errors.is_empty() && self.webhook_subscription.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserError {
    field: Option<Vec<String>>,
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubscriptionId {
    id: String,
}

// =============================================================================
// Client
// =============================================================================

/// [`SubscriptionClient`] backed by the Shopify Admin GraphQL API.
#[derive(Clone)]
pub struct ShopifySubscriptionClient {
    client: reqwest::Client,
    api_version: String,
}

impl ShopifySubscriptionClient {
    #[must_use]
    pub const fn new(client: reqwest::Client, api_version: String) -> Self {
        Self {
            client,
            api_version,
        }
    }

    /// Execute one GraphQL operation against the shop's Admin API.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: &WebhookSubscriptionRequest,
        operation_name: &'static str,
        query: &'static str,
        variables: Value,
    ) -> Result<T, ShopifyError> {
        let endpoint = admin_graphql_url(&request.shop, &self.api_version);
        let body = QueryBody {
            variables,
            query,
            operation_name,
        };

        let response = self
            .client
            .post(&endpoint)
            .header(
                "X-Shopify-Access-Token",
                request.access_token.expose_secret(),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        let graphql_response: Response<T> = response.json().await?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            return Err(ShopifyError::GraphQL(errors));
        }

        graphql_response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![graphql_client::Error {
                message: "No data in response".to_string(),
                locations: None,
                path: None,
                extensions: None,
            }])
        })
    }

    async fn existing(
        &self,
        request: &WebhookSubscriptionRequest,
    ) -> Result<Option<ExistingSubscription>, ShopifyError> {
        let data: ExistingData = self
            .execute(
                request,
                "ExistingWebhookSubscription",
                EXISTING_SUBSCRIPTION,
                json!({ "topic": request.topic.graphql_name() }),
            )
            .await?;

        Ok(data
            .webhook_subscriptions
            .edges
            .into_iter()
            .next()
            .map(|edge| edge.node))
    }
}

/// Operation name and text of the mutation for `delivery`.
const fn mutation_for(delivery: &DeliveryMethod, update: bool) -> (&'static str, &'static str) {
    match (delivery, update) {
        (DeliveryMethod::Http { .. }, false) => ("WebhookSubscriptionCreate", HTTP_CREATE),
        (DeliveryMethod::Http { .. }, true) => ("WebhookSubscriptionUpdate", HTTP_UPDATE),
        (DeliveryMethod::PubSub { .. }, false) => {
            ("PubSubWebhookSubscriptionCreate", PUBSUB_CREATE)
        }
        (DeliveryMethod::PubSub { .. }, true) => ("PubSubWebhookSubscriptionUpdate", PUBSUB_UPDATE),
        (DeliveryMethod::EventBridge { .. }, false) => {
            ("EventBridgeWebhookSubscriptionCreate", EVENTBRIDGE_CREATE)
        }
        (DeliveryMethod::EventBridge { .. }, true) => {
            ("EventBridgeWebhookSubscriptionUpdate", EVENTBRIDGE_UPDATE)
        }
    }
}

/// The `webhookSubscription` input object for `delivery`.
fn subscription_input(delivery: &DeliveryMethod) -> Value {
    match delivery {
        DeliveryMethod::Http { callback_url } => {
            json!({ "callbackUrl": callback_url, "format": "JSON" })
        }
        DeliveryMethod::PubSub { project, topic } => {
            json!({ "pubSubProject": project, "pubSubTopic": topic, "format": "JSON" })
        }
        DeliveryMethod::EventBridge { arn } => json!({ "arn": arn, "format": "JSON" }),
    }
}

/// Variables for a create (`existing_id` is `None`) or update mutation.
fn mutation_variables(
    topic: WebhookTopic,
    delivery: &DeliveryMethod,
    existing_id: Option<&str>,
) -> Value {
    let input = subscription_input(delivery);
    existing_id.map_or_else(
        || json!({ "topic": topic.graphql_name(), "webhookSubscription": input }),
        |id| json!({ "id": id, "webhookSubscription": input }),
    )
}

#[async_trait]
impl SubscriptionClient for ShopifySubscriptionClient {
    #[instrument(skip(self, request), fields(shop = %request.shop, topic = %request.topic))]
    async fn register(
        &self,
        request: &WebhookSubscriptionRequest,
    ) -> Result<RegistrationResponse, SubscriptionError> {
        let existing = self.existing(request).await?;

        let existing_id = match existing {
            Some(subscription) => {
                if subscription.endpoint.into_delivery() == request.delivery {
                    tracing::debug!(id = %subscription.id, "Subscription already up to date");
                    let result = json!({
                        "webhookSubscription": { "id": subscription.id },
                        "unchanged": true
                    });
                    return Ok(RegistrationResponse::single(request.topic, true, result));
                }
                Some(subscription.id)
            }
            None => None,
        };

        let (operation_name, query) = mutation_for(&request.delivery, existing_id.is_some());
        let variables =
            mutation_variables(request.topic, &request.delivery, existing_id.as_deref());

        let data: MutationData = self
            .execute(request, operation_name, query, variables)
            .await?;

        let success = data.result.succeeded();
        let result = serde_json::to_value(&data.result).map_err(ShopifyError::from)?;

        Ok(RegistrationResponse::single(request.topic, success, result))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_text() {
        assert_eq!(
            PUBSUB_CREATE,
            "mutation PubSubWebhookSubscriptionCreate($topic: WebhookSubscriptionTopic!, \
             $webhookSubscription: PubSubWebhookSubscriptionInput!) { result: \
             pubSubWebhookSubscriptionCreate(topic: $topic, webhookSubscription: \
             $webhookSubscription) { userErrors { field message } webhookSubscription { id } } }"
        );
        assert!(HTTP_UPDATE.contains("webhookSubscriptionUpdate(id: $id,"));
        let prefix = "mutation EventBridgeWebhookSubscriptionUpdate($id: ID!";
        assert!(EVENTBRIDGE_UPDATE.starts_with(prefix));
    }

    #[test]
    fn test_mutation_selection() {
        let pubsub = DeliveryMethod::parse("pubsub://p:t").unwrap();
        let http = DeliveryMethod::parse("https://app.example.com/webhooks").unwrap();
        let arn = DeliveryMethod::parse("arn:aws:events:us-east-1::event-source/x").unwrap();

        assert_eq!(mutation_for(&pubsub, false).1, PUBSUB_CREATE);
        assert_eq!(mutation_for(&pubsub, true).1, PUBSUB_UPDATE);
        assert_eq!(mutation_for(&http, false).1, HTTP_CREATE);
        assert_eq!(mutation_for(&arn, true).1, EVENTBRIDGE_UPDATE);
    }

    #[test]
    fn test_create_variables() {
        let pubsub = DeliveryMethod::parse("pubsub://livedemo-344213:webhooklive").unwrap();
        assert_eq!(
            mutation_variables(WebhookTopic::OrdersCreate, &pubsub, None),
            json!({
                "topic": "ORDERS_CREATE",
                "webhookSubscription": {
                    "pubSubProject": "livedemo-344213",
                    "pubSubTopic": "webhooklive",
                    "format": "JSON"
                }
            })
        );
    }

    #[test]
    fn test_update_variables() {
        let http = DeliveryMethod::parse("https://app.example.com/webhooks").unwrap();
        assert_eq!(
            mutation_variables(
                WebhookTopic::CartsUpdate,
                &http,
                Some("gid://shopify/WebhookSubscription/7")
            ),
            json!({
                "id": "gid://shopify/WebhookSubscription/7",
                "webhookSubscription": {
                    "callbackUrl": "https://app.example.com/webhooks",
                    "format": "JSON"
                }
            })
        );
    }

    #[test]
    fn test_existing_endpoint_parses_to_delivery() {
        let data: ExistingData = serde_json::from_value(json!({
            "webhookSubscriptions": { "edges": [ { "node": {
                "id": "gid://shopify/WebhookSubscription/1",
                "endpoint": {
                    "__typename": "WebhookPubSubEndpoint",
                    "pubSubProject": "p",
                    "pubSubTopic": "t"
                }
            } } ] }
        }))
        .unwrap();

        let node = data
            .webhook_subscriptions
            .edges
            .into_iter()
            .next()
            .unwrap()
            .node;
        assert_eq!(
            node.endpoint.into_delivery(),
            DeliveryMethod::parse("pubsub://p:t").unwrap()
        );
    }

    #[test]
    fn test_mutation_payload_success() {
        let ok: MutationData = serde_json::from_value(json!({
            "result": { "userErrors": [], "webhookSubscription": { "id": "gid://1" } }
        }))
        .unwrap();
        assert!(ok.result.succeeded());

        let rejected: MutationData = serde_json::from_value(json!({
            "result": {
                "userErrors": [
                    { "field": ["webhookSubscription"], "message": "Address is invalid" }
                ],
                "webhookSubscription": null
            }
        }))
        .unwrap();
        assert!(!rejected.result.succeeded());
    }
}
