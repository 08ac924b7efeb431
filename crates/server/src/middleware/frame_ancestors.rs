//! Frame-ancestors policy for embedded pages.
//!
//! Pages are rendered inside the Shopify admin iframe. Browsers only allow
//! that when the response names the shop and the admin as permitted
//! ancestors; anything else is framed by nobody.

use axum::{
    extract::Request,
    http::{HeaderValue, header::CONTENT_SECURITY_POLICY},
    middleware::Next,
    response::Response,
};
use hookgate_core::ShopDomain;

/// Policy allowing `shop` and the unified admin to frame the page.
#[must_use]
pub fn frame_ancestors_policy(shop: Option<&ShopDomain>) -> String {
    shop.map_or_else(
        || "frame-ancestors 'none';".to_string(),
        |shop| format!("frame-ancestors https://{shop} https://admin.shopify.com;"),
    )
}

/// Add `Content-Security-Policy: frame-ancestors ...` to page responses.
///
/// The renderer's own policy, if it sent one, is left alone.
pub async fn frame_ancestors_middleware(request: Request, next: Next) -> Response {
    let shop = request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "shop")
            .and_then(|(_, value)| ShopDomain::parse(&value).ok())
    });

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    if !headers.contains_key(CONTENT_SECURITY_POLICY)
        && let Ok(value) = HeaderValue::from_str(&frame_ancestors_policy(shop.as_ref()))
    {
        headers.insert(CONTENT_SECURITY_POLICY, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_for_shop() {
        let shop = ShopDomain::parse("a.myshopify.com").unwrap();
        assert_eq!(
            frame_ancestors_policy(Some(&shop)),
            "frame-ancestors https://a.myshopify.com https://admin.shopify.com;"
        );
    }

    #[test]
    fn test_policy_without_shop() {
        assert_eq!(frame_ancestors_policy(None), "frame-ancestors 'none';");
    }
}
