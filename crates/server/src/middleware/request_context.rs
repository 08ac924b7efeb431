//! Request context middleware for tracing and error correlation.
//!
//! Every request gets an id, taken from an upstream `x-request-id` when present
//! and generated otherwise. The shop a request concerns is read from the
//! `shop` query parameter or, for webhook deliveries, the
//! `x-shopify-shop-domain` header. Both are recorded on the current span and
//! tagged on the Sentry scope; the id is echoed back in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

use crate::error::set_sentry_shop;
use crate::webhooks::delivery::SHOP_DOMAIN_HEADER;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The shop named by a request, if any.
fn request_shop(request: &Request) -> Option<String> {
    let from_query = request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "shop")
            .map(|(_, value)| value.into_owned())
    });

    from_query.or_else(|| {
        request
            .headers()
            .get(SHOP_DOMAIN_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(String::from)
    })
}

/// Record the request id and shop, then run the request.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    let span = Span::current();
    span.record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    if let Some(shop) = request_shop(&request) {
        span.record("shop", &shop);
        set_sentry_shop(&shop);
    }

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;

    use super::*;

    #[test]
    fn test_request_shop_from_query() {
        let request = Request::builder()
            .uri("/?shop=a.myshopify.com&host=abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_shop(&request).as_deref(), Some("a.myshopify.com"));
    }

    #[test]
    fn test_request_shop_from_webhook_header() {
        let request = Request::builder()
            .uri("/webhooks")
            .header(SHOP_DOMAIN_HEADER, "b.myshopify.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_shop(&request).as_deref(), Some("b.myshopify.com"));
    }

    #[test]
    fn test_request_without_shop() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_shop(&request), None);
    }
}
