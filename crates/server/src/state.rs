//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::registry::{MemoryShopStore, ShopRegistry, ShopStore};
use crate::render::{PageRenderer, UpstreamRenderer};
use crate::services::AfterAuth;
use crate::sessions::SessionStore;
use crate::shopify::{
    GraphqlProxy, OAuthClient, SessionTokenVerifier, ShopifyGraphqlProxy, ShopifyOAuthClient,
    ShopifySubscriptionClient,
};
use crate::webhooks::{SubscriptionClient, WebhookProcessor, WebhookSubscriptionManager};

/// External collaborators the server talks to.
///
/// Production wiring comes from [`Collaborators::shopify`]; tests substitute
/// their own implementations.
#[derive(Clone)]
pub struct Collaborators {
    pub oauth: Arc<dyn OAuthClient>,
    pub subscriptions: Arc<dyn SubscriptionClient>,
    pub graphql: Arc<dyn GraphqlProxy>,
    pub renderer: Arc<dyn PageRenderer>,
    pub shop_store: Arc<dyn ShopStore>,
}

impl Collaborators {
    /// Shopify-backed collaborators sharing one HTTP client.
    #[must_use]
    pub fn shopify(config: &AppConfig) -> Self {
        let http = reqwest::Client::new();
        let api_version = config.shopify.api_version.clone();

        Self {
            oauth: Arc::new(ShopifyOAuthClient::new(http.clone(), &config.shopify)),
            subscriptions: Arc::new(ShopifySubscriptionClient::new(
                http.clone(),
                api_version.clone(),
            )),
            graphql: Arc::new(ShopifyGraphqlProxy::new(http.clone(), api_version)),
            renderer: Arc::new(UpstreamRenderer::new(http, config.renderer_url.clone())),
            shop_store: Arc::new(MemoryShopStore::new()),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    registry: ShopRegistry,
    sessions: SessionStore,
    oauth: Arc<dyn OAuthClient>,
    graphql: Arc<dyn GraphqlProxy>,
    renderer: Arc<dyn PageRenderer>,
    webhooks: WebhookProcessor,
    session_tokens: SessionTokenVerifier,
    after_auth: AfterAuth,
}

impl AppState {
    /// Wire the services together around the given collaborators.
    #[must_use]
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let registry = ShopRegistry::new(collaborators.shop_store);
        let manager = WebhookSubscriptionManager::new(
            collaborators.subscriptions,
            config.webhooks.destination.clone(),
        );
        let webhooks = WebhookProcessor::monitored(config.shopify.api_secret.clone(), &registry);
        let session_tokens = SessionTokenVerifier::new(
            config.shopify.api_key.clone(),
            config.shopify.api_secret.clone(),
        );
        let after_auth = AfterAuth::new(registry.clone(), manager);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                sessions: SessionStore::new(),
                oauth: collaborators.oauth,
                graphql: collaborators.graphql,
                renderer: collaborators.renderer,
                webhooks,
                session_tokens,
                after_auth,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Shops that have completed OAuth.
    #[must_use]
    pub fn registry(&self) -> &ShopRegistry {
        &self.inner.registry
    }

    /// Access tokens by shop.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    #[must_use]
    pub fn oauth(&self) -> &dyn OAuthClient {
        self.inner.oauth.as_ref()
    }

    #[must_use]
    pub fn graphql(&self) -> &dyn GraphqlProxy {
        self.inner.graphql.as_ref()
    }

    #[must_use]
    pub fn renderer(&self) -> &dyn PageRenderer {
        self.inner.renderer.as_ref()
    }

    #[must_use]
    pub fn webhooks(&self) -> &WebhookProcessor {
        &self.inner.webhooks
    }

    #[must_use]
    pub fn session_tokens(&self) -> &SessionTokenVerifier {
        &self.inner.session_tokens
    }

    #[must_use]
    pub fn after_auth(&self) -> &AfterAuth {
        &self.inner.after_auth
    }
}
