//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. Route handlers return `Result<T, AppError>`.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::registry::RegistryError;
use crate::render::RenderError;
use crate::shopify::ShopifyError;

/// Tells App Bridge to send the merchant back through OAuth.
pub const REAUTHORIZE_HEADER: &str = "x-shopify-api-request-failure-reauthorize";
/// Where App Bridge should send the merchant.
pub const REAUTHORIZE_URL_HEADER: &str = "x-shopify-api-request-failure-reauthorize-url";

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Shop registry storage failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// The page renderer failed.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The embedded app must re-run OAuth before retrying.
    #[error("Reauthorization required")]
    Reauthorize {
        /// Shop to re-run OAuth for, when known.
        shop: Option<String>,
    },

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The `/auth` location for a reauthorization.
    #[must_use]
    pub fn reauthorize_url(shop: Option<&str>) -> String {
        shop.map_or_else(
            || "/auth".to_string(),
            |shop| format!("/auth?shop={}", urlencoding::encode(shop)),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Registry(_) | Self::Internal(_) | Self::Shopify(_) | Self::Render(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        if let Self::Reauthorize { shop } = &self {
            tracing::info!(shop = ?shop, "Requesting reauthorization");
            let location = Self::reauthorize_url(shop.as_deref());
            let mut response = StatusCode::FORBIDDEN.into_response();
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static(REAUTHORIZE_HEADER),
                HeaderValue::from_static("1"),
            );
            if let Ok(value) = HeaderValue::from_str(&location) {
                headers.insert(HeaderName::from_static(REAUTHORIZE_URL_HEADER), value);
            }
            return response;
        }

        let status = match &self {
            Self::Registry(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Shopify(_) | Self::Render(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Reauthorize { .. } => StatusCode::FORBIDDEN,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Registry(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Shopify(_) | Self::Render(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Tag the Sentry scope with the shop being served.
///
/// Call this once the request's shop is known so errors group by shop.
pub fn set_sentry_shop(shop: &str) {
    sentry::configure_scope(|scope| {
        scope.set_tag("shop", shop);
    });
}

/// Add a breadcrumb for a step in a request.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of steps
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("oauth", "Exchanged code", Some(&[("shop", "a.myshopify.com")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
