//! Post-OAuth orchestration.
//!
//! Runs once per completed handshake, in order:
//!
//! 1. mark the shop authenticated in the registry,
//! 2. register every monitored webhook topic, awaiting all of them,
//! 3. hand back the in-app redirect.
//!
//! The redirect is issued whatever happens in steps 1 and 2. Registration
//! failures are logged by the subscription manager and otherwise ignored.

use secrecy::SecretString;
use tracing::instrument;

use crate::registry::ShopRegistry;
use crate::webhooks::{WebhookSubscriptionManager, WebhookSubscriptionResult};

/// Input to [`AfterAuth::run`]: what the OAuth callback learned.
#[derive(Clone)]
pub struct AuthGrant {
    pub shop: String,
    pub access_token: SecretString,
    pub scope: String,
    /// Base64 admin host passed through by App Bridge, if any.
    pub host: Option<String>,
}

impl std::fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGrant")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("host", &self.host)
            .finish()
    }
}

/// Result of a completed orchestration.
#[derive(Debug, Clone)]
pub struct AfterAuthOutcome {
    /// Location the merchant's browser is sent to.
    pub redirect_to: String,
    /// One entry per monitored topic, in registration order.
    pub registrations: Vec<WebhookSubscriptionResult>,
}

/// Post-OAuth orchestrator.
#[derive(Clone)]
pub struct AfterAuth {
    registry: ShopRegistry,
    manager: WebhookSubscriptionManager,
}

impl AfterAuth {
    #[must_use]
    pub const fn new(registry: ShopRegistry, manager: WebhookSubscriptionManager) -> Self {
        Self { registry, manager }
    }

    /// Mark the shop authenticated, register its webhooks, and pick the redirect.
    #[instrument(skip(self, grant), fields(shop = %grant.shop))]
    pub async fn run(&self, grant: AuthGrant) -> AfterAuthOutcome {
        if let Err(e) = self.registry.put(&grant.shop, &grant.scope).await {
            tracing::error!(error = %e, "Failed to record authenticated shop");
        }

        let registrations = self
            .manager
            .register_all(&grant.shop, &grant.access_token)
            .await;

        let failed = registrations.iter().filter(|r| !r.success).count();
        tracing::info!(
            registered = registrations.len() - failed,
            failed,
            "Webhook registration finished"
        );

        AfterAuthOutcome {
            redirect_to: app_redirect(&grant.shop, grant.host.as_deref()),
            registrations,
        }
    }
}

/// In-app location after OAuth: `/?shop=<shop>&host=<host>`.
#[must_use]
pub fn app_redirect(shop: &str, host: Option<&str>) -> String {
    format!(
        "/?shop={}&host={}",
        urlencoding::encode(shop),
        urlencoding::encode(host.unwrap_or_default())
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use hookgate_core::{DeliveryMethod, WebhookTopic};

    use super::*;
    use crate::registry::{RegistryError, ShopStore};
    use crate::webhooks::{
        RegistrationResponse, SubscriptionClient, SubscriptionError, WebhookSubscriptionRequest,
    };

    /// Records call order across the registry and the subscription client.
    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct JournalStore {
        journal: Arc<Journal>,
        fail: bool,
    }

    #[async_trait]
    impl ShopStore for JournalStore {
        async fn put(&self, shop: &str, _scope: &str) -> Result<(), RegistryError> {
            self.journal.push(format!("put {shop}"));
            if self.fail {
                return Err(RegistryError::Storage("disk full".to_string()));
            }
            Ok(())
        }

        async fn remove(&self, _shop: &str) -> Result<bool, RegistryError> {
            Ok(false)
        }

        async fn get(&self, _shop: &str) -> Result<Option<String>, RegistryError> {
            Ok(None)
        }
    }

    struct JournalClient {
        journal: Arc<Journal>,
        failing: Option<WebhookTopic>,
    }

    #[async_trait]
    impl SubscriptionClient for JournalClient {
        async fn register(
            &self,
            request: &WebhookSubscriptionRequest,
        ) -> Result<RegistrationResponse, SubscriptionError> {
            self.journal.push(format!("register {}", request.topic));
            let success = self.failing != Some(request.topic);
            Ok(RegistrationResponse::single(
                request.topic,
                success,
                serde_json::Value::Null,
            ))
        }
    }

    fn after_auth(
        journal: &Arc<Journal>,
        store_fails: bool,
        failing: Option<WebhookTopic>,
    ) -> AfterAuth {
        let registry = ShopRegistry::new(Arc::new(JournalStore {
            journal: Arc::clone(journal),
            fail: store_fails,
        }));
        let manager = WebhookSubscriptionManager::new(
            Arc::new(JournalClient {
                journal: Arc::clone(journal),
                failing,
            }),
            DeliveryMethod::parse("pubsub://p:t").unwrap(),
        );
        AfterAuth::new(registry, manager)
    }

    fn grant(host: Option<&str>) -> AuthGrant {
        AuthGrant {
            shop: "a.myshopify.com".to_string(),
            access_token: SecretString::from("shpat_token"),
            scope: "read_products".to_string(),
            host: host.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_registry_then_six_registrations() {
        let journal = Arc::new(Journal::default());
        let outcome = after_auth(&journal, false, Some(WebhookTopic::ProductsCreate))
            .run(grant(Some("YWRtaW4uc2hvcGlmeS5jb20vc3RvcmUvYQ")))
            .await;

        let mut expected = vec!["put a.myshopify.com".to_string()];
        expected.extend(
            WebhookTopic::MONITORED
                .iter()
                .map(|topic| format!("register {topic}")),
        );
        assert_eq!(journal.entries(), expected);

        assert_eq!(outcome.registrations.len(), 6);
        assert_eq!(
            outcome.redirect_to,
            "/?shop=a.myshopify.com&host=YWRtaW4uc2hvcGlmeS5jb20vc3RvcmUvYQ"
        );
    }

    #[tokio::test]
    async fn test_redirects_even_when_registry_fails() {
        let journal = Arc::new(Journal::default());
        let outcome = after_auth(&journal, true, None).run(grant(None)).await;

        assert_eq!(journal.entries().len(), 7);
        assert_eq!(outcome.redirect_to, "/?shop=a.myshopify.com&host=");
    }

    #[test]
    fn test_app_redirect_encodes() {
        assert_eq!(
            app_redirect("a.myshopify.com", Some("abc=&x")),
            "/?shop=a.myshopify.com&host=abc%3D%26x"
        );
    }

    #[test]
    fn test_grant_debug_redacts_token() {
        let output = format!("{:?}", grant(None));
        assert!(!output.contains("shpat_token"));
    }
}
