//! Page rendering.
//!
//! Pages and front-end assets are produced by a separate renderer process.
//! [`UpstreamRenderer`] forwards the request to it and streams the response
//! back without buffering either body.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, header};
use axum::response::Response;
use thiserror::Error;
use tracing::instrument;
use url::Url;

/// Errors from the page renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer could not be reached or broke off mid-response.
    #[error("renderer unavailable: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The request path could not be joined onto the renderer URL.
    #[error("invalid render target: {0}")]
    InvalidTarget(String),

    /// The renderer's response could not be rebuilt.
    #[error("invalid renderer response: {0}")]
    InvalidResponse(String),
}

/// Produces the HTTP response for a page or asset request.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, request: Request) -> Result<Response, RenderError>;
}

/// Connection-scoped headers that must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// [`PageRenderer`] that proxies to a renderer listening on `RENDERER_URL`.
#[derive(Clone)]
pub struct UpstreamRenderer {
    client: reqwest::Client,
    base: Url,
}

impl UpstreamRenderer {
    #[must_use]
    pub const fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    /// The renderer URL for a request's path and query.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidTarget` if the path cannot be joined.
    pub fn target(&self, path_and_query: &str) -> Result<Url, RenderError> {
        self.base
            .join(path_and_query)
            .map_err(|e| RenderError::InvalidTarget(format!("{path_and_query}: {e}")))
    }
}

#[async_trait]
impl PageRenderer for UpstreamRenderer {
    #[instrument(skip(self, request), fields(path = %request.uri().path()))]
    async fn render(&self, request: Request) -> Result<Response, RenderError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let target = self.target(path_and_query)?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let upstream = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send()
            .await?;

        let mut builder = Response::builder().status(upstream.status());
        if let Some(response_headers) = builder.headers_mut() {
            response_headers.extend(
                upstream
                    .headers()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
            strip_hop_by_hop(response_headers);
        }

        builder
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| RenderError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn renderer() -> UpstreamRenderer {
        UpstreamRenderer::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:3000").unwrap(),
        )
    }

    #[test]
    fn test_target_keeps_path_and_query() {
        assert_eq!(
            renderer()
                .target("/_next/static/chunks/main.js?v=1")
                .unwrap()
                .as_str(),
            "http://127.0.0.1:3000/_next/static/chunks/main.js?v=1"
        );
        assert_eq!(
            renderer().target("/").unwrap().as_str(),
            "http://127.0.0.1:3000/"
        );
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(
            header::TRANSFER_ENCODING,
            HeaderValue::from_static("chunked"),
        );
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }
}
