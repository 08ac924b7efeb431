//! Router-level integration tests for Hookgate.
//!
//! Tests drive the real axum `Router` with `tower::ServiceExt::oneshot`.
//! Every external collaborator is replaced by a fake from this crate that
//! records what it was asked to do in a shared [`Journal`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p hookgate-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::Response;
use hookgate_core::{DeliveryMethod, ShopDomain, WebhookTopic};
use hookgate_server::config::{AppConfig, Environment, ShopifyAppConfig, WebhookConfig};
use hookgate_server::registry::MemoryShopStore;
use hookgate_server::render::{PageRenderer, RenderError};
use hookgate_server::sessions::ShopSession;
use hookgate_server::shopify::{
    AccessGrant, GraphqlProxy, OAuthClient, ProxyResponse, ShopifyError, signature,
};
use hookgate_server::state::{AppState, Collaborators};
use hookgate_server::webhooks::{
    RegistrationResponse, SubscriptionClient, SubscriptionError, WebhookSubscriptionRequest,
};
use jsonwebtoken::{EncodingKey, Header};
use secrecy::SecretString;

pub const API_KEY: &str = "test-api-key";
pub const API_SECRET: &str = "test-api-secret";
pub const ACCESS_TOKEN: &str = "shpat_integration";
pub const GRANTED_SCOPE: &str = "write_products,read_orders";

/// Ordered record of every collaborator call.
#[derive(Debug, Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries starting with `prefix`.
    #[must_use]
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

// =============================================================================
// Fakes
// =============================================================================

/// OAuth fake: real HMAC verification, canned token exchange.
pub struct FakeOAuth {
    journal: Arc<Journal>,
}

#[async_trait]
impl OAuthClient for FakeOAuth {
    fn authorization_url(&self, shop: &ShopDomain, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://{shop}/admin/oauth/authorize?client_id={API_KEY}&redirect_uri={}&state={state}",
            urlencoding::encode(redirect_uri)
        )
    }

    fn verify_callback(&self, params: &BTreeMap<String, String>) -> bool {
        signature::verify_query(params, API_SECRET)
    }

    async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessGrant, ShopifyError> {
        self.journal.push(format!("exchange {shop} {code}"));
        Ok(AccessGrant {
            access_token: SecretString::from(ACCESS_TOKEN),
            scope: GRANTED_SCOPE.to_string(),
        })
    }
}

/// Subscription fake: fails the configured topics, succeeds the rest.
pub struct FakeSubscriptions {
    journal: Arc<Journal>,
    failing: HashSet<WebhookTopic>,
}

#[async_trait]
impl SubscriptionClient for FakeSubscriptions {
    async fn register(
        &self,
        request: &WebhookSubscriptionRequest,
    ) -> Result<RegistrationResponse, SubscriptionError> {
        self.journal
            .push(format!("register {} {}", request.shop, request.topic));
        let success = !self.failing.contains(&request.topic);
        Ok(RegistrationResponse::single(
            request.topic,
            success,
            serde_json::json!({ "delivery": request.delivery.to_string() }),
        ))
    }
}

/// GraphQL fake: echoes the request body, or rejects the token.
pub struct FakeGraphql {
    journal: Arc<Journal>,
    reject_token: bool,
}

#[async_trait]
impl GraphqlProxy for FakeGraphql {
    async fn proxy(
        &self,
        session: &ShopSession,
        body: Bytes,
    ) -> Result<ProxyResponse, ShopifyError> {
        self.journal
            .push(format!("graphql {} {}", session.shop, session.token()));
        if self.reject_token {
            return Err(ShopifyError::Unauthorized("revoked".to_string()));
        }
        Ok(ProxyResponse {
            status: StatusCode::OK,
            content_type: Some("application/json".to_string()),
            body,
        })
    }
}

/// Renderer fake: answers `rendered <path and query>`.
pub struct FakeRenderer {
    journal: Arc<Journal>,
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, request: Request) -> Result<Response, RenderError> {
        let target = request
            .uri()
            .path_and_query()
            .map_or_else(|| "/".to_string(), ToString::to_string);
        self.journal.push(format!("render {target}"));
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html")
            .body(Body::from(format!("rendered {target}")))
            .map_err(|e| RenderError::InvalidResponse(e.to_string()))
    }
}

// =============================================================================
// Test application
// =============================================================================

/// Knobs for [`TestApp::build`].
#[derive(Debug, Default)]
pub struct TestOptions {
    pub failing_topics: HashSet<WebhookTopic>,
    pub reject_graphql_token: bool,
}

/// A wired application plus handles for assertions.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub journal: Arc<Journal>,
}

/// Configuration as the binary would load it, minus the environment.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 8081,
        environment: Environment::Development,
        shopify: ShopifyAppConfig {
            api_key: API_KEY.to_string(),
            api_secret: SecretString::from(API_SECRET),
            scopes: vec!["read_products".to_string(), "read_orders".to_string()],
            host_name: "app.example.com".to_string(),
            api_version: "2022-01".to_string(),
        },
        webhooks: WebhookConfig {
            destination: DeliveryMethod::parse("pubsub://livedemo-344213:webhooklive").unwrap(),
        },
        renderer_url: url::Url::parse("http://127.0.0.1:3000").unwrap(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::build(TestOptions::default())
    }

    #[must_use]
    pub fn build(options: TestOptions) -> Self {
        let journal = Arc::new(Journal::default());
        let collaborators = Collaborators {
            oauth: Arc::new(FakeOAuth {
                journal: Arc::clone(&journal),
            }),
            subscriptions: Arc::new(FakeSubscriptions {
                journal: Arc::clone(&journal),
                failing: options.failing_topics,
            }),
            graphql: Arc::new(FakeGraphql {
                journal: Arc::clone(&journal),
                reject_token: options.reject_graphql_token,
            }),
            renderer: Arc::new(FakeRenderer {
                journal: Arc::clone(&journal),
            }),
            shop_store: Arc::new(MemoryShopStore::new()),
        };

        let state = AppState::new(test_config(), collaborators);
        let router = hookgate_server::app(state.clone());

        Self {
            router,
            state,
            journal,
        }
    }

    /// Send one request through a clone of the router.
    pub async fn send(&self, request: Request) -> Response {
        use tower::ServiceExt;

        self.router.clone().oneshot(request).await.unwrap()
    }

    /// `GET uri` with optional extra headers.
    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder().method("GET").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// `POST uri` with a body and optional extra headers.
    pub async fn post(
        &self,
        uri: &str,
        body: impl Into<Body>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method("POST").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(body.into()).unwrap()).await
    }

    /// Mark `shop` authenticated without running OAuth.
    pub async fn authenticate(&self, shop: &str) {
        self.state
            .registry()
            .put(shop, GRANTED_SCOPE)
            .await
            .unwrap();
        self.state
            .sessions()
            .store(ShopSession::new(
                shop,
                SecretString::from(ACCESS_TOKEN),
                GRANTED_SCOPE,
            ))
            .await;
    }

    /// Run a full OAuth handshake for `shop`, returning the callback response.
    pub async fn install(&self, shop: &str, host: &str) -> Response {
        let begin = self.get(&format!("/auth?shop={shop}"), &[]).await;
        let cookie = session_cookie(&begin);
        let state = query_param(location(&begin), "state").unwrap();

        let params = signed_callback(&[
            ("code", "auth-code"),
            ("host", host),
            ("shop", shop),
            ("state", &state),
            ("timestamp", "1700000000"),
        ]);
        self.get(&format!("/auth/callback?{params}"), &[("cookie", &cookie)])
            .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// The `name=value` part of the session `Set-Cookie`.
#[must_use]
pub fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap_or_default()
        .to_string()
}

/// A query parameter from a URL or path.
#[must_use]
pub fn query_param(target: &str, name: &str) -> Option<String> {
    let parsed = url::Url::parse("http://placeholder.invalid")
        .unwrap()
        .join(target)
        .ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// A callback query string signed with the app secret.
#[must_use]
pub fn signed_callback(pairs: &[(&str, &str)]) -> String {
    let params: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let hmac = signature::sign_query(&params, API_SECRET);

    params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .chain(std::iter::once(("hmac", hmac.as_str())))
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Headers for a signed webhook delivery.
#[must_use]
pub fn webhook_headers(body: &[u8], topic: &str, shop: &str) -> Vec<(String, String)> {
    vec![
        (
            "x-shopify-hmac-sha256".to_string(),
            signature::sign_body(body, API_SECRET),
        ),
        ("x-shopify-topic".to_string(), topic.to_string()),
        ("x-shopify-shop-domain".to_string(), shop.to_string()),
        ("content-type".to_string(), "application/json".to_string()),
    ]
}

/// A session token for `shop`, valid for the next minute.
#[must_use]
pub fn session_token(shop: &str, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "iss": format!("https://{shop}/admin"),
        "dest": format!("https://{shop}"),
        "aud": API_KEY,
        "sub": "1",
        "exp": now + 60,
        "nbf": now - 5,
        "iat": now - 5,
        "jti": "integration",
        "sid": "session-id"
    });
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Read a response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}
