//! App Bridge session tokens.
//!
//! The embedded front-end authenticates its `/graphql` calls with a short-lived
//! HS256 JWT signed with the app's API secret and sent as
//! `Authorization: Bearer <token>`. The shop is taken from the `dest` claim.

use hookgate_core::ShopDomain;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Clock skew tolerated on `exp` and `nbf`, in seconds.
const LEEWAY_SECONDS: u64 = 5;

/// Why a session token was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("missing bearer token")]
    Missing,
    #[error("malformed token")]
    Malformed,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("audience does not match this app")]
    WrongAudience,
    #[error("invalid shop in dest claim: {0}")]
    InvalidShop(String),
}

impl From<jsonwebtoken::errors::Error> for SessionTokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidAlgorithm => Self::UnsupportedAlgorithm,
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidAudience => Self::WrongAudience,
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    dest: String,
    sub: Option<String>,
    sid: Option<String>,
}

/// The verified identity carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Shop the token was issued for.
    pub shop: ShopDomain,
    /// Staff user id, when present.
    pub user_id: Option<String>,
    /// App Bridge session id, when present.
    pub session_id: Option<String>,
}

/// Verifies session tokens against the app's API key and secret.
#[derive(Clone)]
pub struct SessionTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionTokenVerifier {
    #[must_use]
    pub fn new(api_key: String, api_secret: SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECONDS;
        validation.validate_nbf = true;
        validation.set_audience(&[api_key]);
        validation.set_required_spec_claims(&["exp", "nbf", "aud"]);

        Self {
            key: DecodingKey::from_secret(api_secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Extract and verify the bearer token from an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns `SessionTokenError` when the header is absent or the token is invalid.
    pub fn verify_header(
        &self,
        authorization: Option<&str>,
    ) -> Result<SessionClaims, SessionTokenError> {
        let token = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SessionTokenError::Missing)?;
        self.verify(token)
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    ///
    /// Returns `SessionTokenError` describing the first failed check.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionTokenError> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?.claims;

        let host = url::Url::parse(&claims.dest)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| SessionTokenError::InvalidShop(claims.dest.clone()))?;
        let shop = ShopDomain::parse(&host).map_err(|_| SessionTokenError::InvalidShop(host))?;

        Ok(SessionClaims {
            shop,
            user_id: claims.sub,
            session_id: claims.sid,
        })
    }
}
