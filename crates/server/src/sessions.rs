//! OAuth sessions holding each shop's Admin API access token.
//!
//! This is placeholder storage: sessions live in memory and are lost on
//! restart. Swap in a durable store before running more than one instance.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

/// An authenticated shop's access token and granted scopes.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopSession {
    /// Shop domain (e.g., my-store.myshopify.com).
    pub shop: String,
    /// Admin API access token.
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl ShopSession {
    /// Build a session from the comma-separated scope string Shopify returns.
    #[must_use]
    pub fn new(shop: &str, access_token: SecretString, scope: &str) -> Self {
        Self {
            shop: shop.to_string(),
            access_token,
            scopes: crate::config::parse_scopes(scope),
        }
    }

    /// Whether every required scope was granted.
    ///
    /// Shopify collapses `write_x` to imply `read_x`, so a granted write scope
    /// satisfies the matching read scope.
    #[must_use]
    pub fn covers(&self, required: &[String]) -> bool {
        required.iter().all(|scope| {
            self.scopes.contains(scope)
                || scope
                    .strip_prefix("read_")
                    .is_some_and(|rest| self.scopes.iter().any(|s| s == &format!("write_{rest}")))
        })
    }

    /// The access token, for the outbound request header.
    #[must_use]
    pub fn token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

impl std::fmt::Debug for ShopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// In-memory session storage keyed by shop domain.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, ShopSession>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the session for its shop.
    pub async fn store(&self, session: ShopSession) {
        self.sessions
            .write()
            .await
            .insert(session.shop.clone(), session);
    }

    /// Load the session for `shop`.
    pub async fn load(&self, shop: &str) -> Option<ShopSession> {
        self.sessions.read().await.get(shop).cloned()
    }

    /// Delete the session for `shop`.
    pub async fn delete(&self, shop: &str) -> bool {
        self.sessions.write().await.remove(shop).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(scope: &str) -> ShopSession {
        ShopSession::new(
            "a.myshopify.com",
            SecretString::from("shpat_super_secret_token"),
            scope,
        )
    }

    #[test]
    fn test_covers_exact_scopes() {
        let s = session("read_products,write_orders");
        assert!(s.covers(&["read_products".to_string()]));
        assert!(s.covers(&["read_products".to_string(), "write_orders".to_string()]));
        assert!(!s.covers(&["read_customers".to_string()]));
    }

    #[test]
    fn test_write_implies_read() {
        let s = session("write_orders");
        assert!(s.covers(&["read_orders".to_string()]));
        assert!(!s.covers(&["write_products".to_string()]));
    }

    #[test]
    fn test_debug_redacts_token() {
        let output = format!("{:?}", session("read_products"));
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("shpat_super_secret_token"));
    }

    #[tokio::test]
    async fn test_store_load_delete() {
        let store = SessionStore::new();
        assert!(store.load("a.myshopify.com").await.is_none());

        store.store(session("read_products")).await;
        let loaded = store.load("a.myshopify.com").await;
        assert_eq!(
            loaded.map(|s| s.scopes),
            Some(vec!["read_products".to_string()])
        );

        assert!(store.delete("a.myshopify.com").await);
        assert!(!store.delete("a.myshopify.com").await);
    }
}
