//! Webhook topics monitored by the app.
//!
//! A topic has two spellings on the wire:
//! - the GraphQL enum name used when subscribing (`CUSTOMERS_CREATE`)
//! - the header value Shopify sends on delivery (`customers/create`)
//!
//! Both parse back to the same [`WebhookTopic`].

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a topic name is not one of the known topics.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown webhook topic: {0}")]
pub struct UnknownTopic(pub String);

/// A store event category that can trigger a webhook delivery.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookTopic {
    CustomersCreate,
    OrdersCreate,
    ProductsCreate,
    CartsCreate,
    CartsUpdate,
    CustomersDelete,
}

impl WebhookTopic {
    /// Topics the app subscribes to after every completed OAuth handshake.
    ///
    /// The same list installs the delivery handlers that invalidate a shop's
    /// login, so any topic added here is both subscribed to and forces re-login.
    /// Registration happens in this order.
    pub const MONITORED: [Self; 6] = [
        Self::CustomersCreate,
        Self::OrdersCreate,
        Self::ProductsCreate,
        Self::CartsCreate,
        Self::CartsUpdate,
        Self::CustomersDelete,
    ];

    /// GraphQL `WebhookSubscriptionTopic` enum value.
    #[must_use]
    pub const fn graphql_name(self) -> &'static str {
        match self {
            Self::CustomersCreate => "CUSTOMERS_CREATE",
            Self::OrdersCreate => "ORDERS_CREATE",
            Self::ProductsCreate => "PRODUCTS_CREATE",
            Self::CartsCreate => "CARTS_CREATE",
            Self::CartsUpdate => "CARTS_UPDATE",
            Self::CustomersDelete => "CUSTOMERS_DELETE",
        }
    }

    /// Value of the `X-Shopify-Topic` header on delivery.
    #[must_use]
    pub const fn header_name(self) -> &'static str {
        match self {
            Self::CustomersCreate => "customers/create",
            Self::OrdersCreate => "orders/create",
            Self::ProductsCreate => "products/create",
            Self::CartsCreate => "carts/create",
            Self::CartsUpdate => "carts/update",
            Self::CustomersDelete => "customers/delete",
        }
    }
}

impl fmt::Display for WebhookTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.graphql_name())
    }
}

impl std::str::FromStr for WebhookTopic {
    type Err = UnknownTopic;

    /// Accepts either the GraphQL name or the delivery header name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::MONITORED
            .into_iter()
            .find(|topic| topic.graphql_name().eq_ignore_ascii_case(s) || topic.header_name() == s)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_monitored_order() {
        let names: Vec<_> = WebhookTopic::MONITORED
            .iter()
            .map(|t| t.graphql_name())
            .collect();
        assert_eq!(
            names,
            [
                "CUSTOMERS_CREATE",
                "ORDERS_CREATE",
                "PRODUCTS_CREATE",
                "CARTS_CREATE",
                "CARTS_UPDATE",
                "CUSTOMERS_DELETE",
            ]
        );
    }

    #[test]
    fn test_parse_graphql_name() {
        assert_eq!(
            "CARTS_UPDATE".parse::<WebhookTopic>().unwrap(),
            WebhookTopic::CartsUpdate
        );
    }

    #[test]
    fn test_parse_header_name() {
        assert_eq!(
            "customers/delete".parse::<WebhookTopic>().unwrap(),
            WebhookTopic::CustomersDelete
        );
        assert_eq!(
            "orders/create".parse::<WebhookTopic>().unwrap(),
            WebhookTopic::OrdersCreate
        );
    }

    #[test]
    fn test_parse_unknown() {
        let err = "app/uninstalled".parse::<WebhookTopic>().unwrap_err();
        assert_eq!(err, UnknownTopic("app/uninstalled".to_string()));
        assert_eq!(err.to_string(), "unknown webhook topic: app/uninstalled");
    }

    #[test]
    fn test_serde_uses_graphql_name() {
        let json = serde_json::to_string(&WebhookTopic::ProductsCreate).unwrap();
        assert_eq!(json, "\"PRODUCTS_CREATE\"");
    }
}
