//! Shop registry: the "has this shop completed login" gate.
//!
//! The registry maps a shop domain to the OAuth scope it was granted. An entry
//! is written when an OAuth handshake completes and removed whenever a
//! monitored webhook fires for the shop, which forces the merchant back
//! through OAuth on their next page load.
//!
//! Storage is injected through [`ShopStore`]. [`MemoryShopStore`] keeps
//! entries for the life of the process only; a restart logs every shop out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from a registry backing store.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The backing store failed.
    #[error("registry storage error: {0}")]
    Storage(String),
}

/// Backing storage for the shop registry.
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Insert or overwrite the scope stored for `shop`.
    async fn put(&self, shop: &str, scope: &str) -> Result<(), RegistryError>;

    /// Remove the entry for `shop`. Returns whether an entry existed.
    async fn remove(&self, shop: &str) -> Result<bool, RegistryError>;

    /// Get the scope stored for `shop`.
    async fn get(&self, shop: &str) -> Result<Option<String>, RegistryError>;
}

/// In-memory [`ShopStore`]. Never fails.
#[derive(Debug, Default)]
pub struct MemoryShopStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryShopStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShopStore for MemoryShopStore {
    async fn put(&self, shop: &str, scope: &str) -> Result<(), RegistryError> {
        self.entries
            .write()
            .await
            .insert(shop.to_string(), scope.to_string());
        Ok(())
    }

    async fn remove(&self, shop: &str) -> Result<bool, RegistryError> {
        Ok(self.entries.write().await.remove(shop).is_some())
    }

    async fn get(&self, shop: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.entries.read().await.get(shop).cloned())
    }
}

/// The authenticated-shop gate.
///
/// Cheaply cloneable; every clone shares the same store.
#[derive(Clone)]
pub struct ShopRegistry {
    store: Arc<dyn ShopStore>,
}

impl ShopRegistry {
    /// Create a registry over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self { store }
    }

    /// Create a registry backed by a fresh [`MemoryShopStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryShopStore::new()))
    }

    /// Record that `shop` completed OAuth with `scope`. Overwrites any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Storage` if the backing store fails.
    pub async fn put(&self, shop: &str, scope: &str) -> Result<(), RegistryError> {
        self.store.put(shop, scope).await?;
        tracing::debug!(shop = %shop, scope = %scope, "Shop registered");
        Ok(())
    }

    /// Forget `shop`, forcing it back through OAuth. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Storage` if the backing store fails.
    pub async fn invalidate(&self, shop: &str) -> Result<bool, RegistryError> {
        let removed = self.store.remove(shop).await?;
        if removed {
            tracing::info!(shop = %shop, "Shop login invalidated");
        }
        Ok(removed)
    }

    /// Whether `shop` has completed OAuth since it was last invalidated.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Storage` if the backing store fails.
    pub async fn is_authenticated(&self, shop: &str) -> Result<bool, RegistryError> {
        Ok(self.store.get(shop).await?.is_some())
    }

    /// The scope recorded for `shop`, if any.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Storage` if the backing store fails.
    pub async fn scope(&self, shop: &str) -> Result<Option<String>, RegistryError> {
        self.store.get(shop).await
    }
}

impl std::fmt::Debug for ShopRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_authenticated() {
        let registry = ShopRegistry::in_memory();
        assert!(!registry.is_authenticated("a.myshopify.com").await.unwrap());

        registry
            .put("a.myshopify.com", "read_products")
            .await
            .unwrap();

        assert!(registry.is_authenticated("a.myshopify.com").await.unwrap());
        assert_eq!(
            registry.scope("a.myshopify.com").await.unwrap().as_deref(),
            Some("read_products")
        );
    }

    #[tokio::test]
    async fn test_put_overwrites_scope() {
        let registry = ShopRegistry::in_memory();
        registry
            .put("a.myshopify.com", "read_products")
            .await
            .unwrap();
        registry
            .put("a.myshopify.com", "read_products,write_orders")
            .await
            .unwrap();

        assert_eq!(
            registry.scope("a.myshopify.com").await.unwrap().as_deref(),
            Some("read_products,write_orders")
        );
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let registry = ShopRegistry::in_memory();
        registry
            .put("a.myshopify.com", "read_products")
            .await
            .unwrap();

        assert!(registry.invalidate("a.myshopify.com").await.unwrap());
        assert!(!registry.is_authenticated("a.myshopify.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_absent_is_noop() {
        let registry = ShopRegistry::in_memory();
        registry
            .put("b.myshopify.com", "read_products")
            .await
            .unwrap();

        assert!(!registry.invalidate("a.myshopify.com").await.unwrap());
        assert!(!registry.invalidate("a.myshopify.com").await.unwrap());
        assert!(registry.is_authenticated("b.myshopify.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_store() {
        let registry = ShopRegistry::in_memory();
        let clone = registry.clone();
        clone.put("a.myshopify.com", "read_products").await.unwrap();
        assert!(registry.is_authenticated("a.myshopify.com").await.unwrap());
    }
}
