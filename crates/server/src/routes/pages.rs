//! Embedded app pages.
//!
//! Front-end assets are served straight from the renderer. Everything else is
//! a page, rendered only for shops that have completed OAuth; other shops are
//! sent to `/auth` first.

use axum::{
    extract::{Request, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};
use hookgate_core::ShopDomain;

use crate::error::AppError;
use crate::state::AppState;

/// The first `shop` query parameter, if any.
fn shop_param(uri: &Uri) -> Option<String> {
    uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "shop")
            .map(|(_, value)| value.into_owned())
    })
}

/// Serve a front-end asset without the login gate.
///
/// # Route
///
/// `GET /_next/static/{*path}`, `GET /_next/webpack-hmr`
pub async fn asset(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    Ok(state.renderer().render(request).await?)
}

/// Render a page for an authenticated shop.
///
/// # Route
///
/// `GET /`, `GET /{*path}`
pub async fn page(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let shop = shop_param(request.uri()).unwrap_or_default();
    // Shops are registered under their normalized domain.
    let key = ShopDomain::parse(&shop).map_or_else(|_| shop.clone(), ShopDomain::into_inner);

    if !state.registry().is_authenticated(&key).await? {
        tracing::debug!(shop = %shop, "Shop not authenticated, starting OAuth");
        let location = format!("/auth?shop={}", urlencoding::encode(&shop));
        return Ok(Redirect::to(&location).into_response());
    }

    Ok(state.renderer().render(request).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_param_takes_first() {
        let uri: Uri = "/?shop=a.myshopify.com&shop=b.myshopify.com".parse().unwrap();
        assert_eq!(shop_param(&uri).as_deref(), Some("a.myshopify.com"));
    }

    #[test]
    fn test_shop_param_absent() {
        let uri: Uri = "/settings?host=abc".parse().unwrap();
        assert_eq!(shop_param(&uri), None);
        assert_eq!(shop_param(&Uri::from_static("/")), None);
    }
}
