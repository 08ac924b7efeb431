//! Session middleware configuration.
//!
//! The only thing kept in the cookie session is the OAuth `state` nonce between
//! `/auth` and `/auth/callback`, so a memory store with a short inactivity
//! expiry is enough.

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Environment;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "hookgate_session";

/// Session key holding the OAuth `state` nonce.
pub const OAUTH_STATE_KEY: &str = "oauth_state";

/// An OAuth handshake has this long to come back (10 minutes).
const SESSION_EXPIRY_SECONDS: i64 = 10 * 60;

/// Create the session layer with an in-memory store.
///
/// In production the app runs inside the Shopify admin iframe, so the cookie
/// must be `SameSite=None; Secure` to survive the cross-site callback.
#[must_use]
pub fn create_session_layer(environment: Environment) -> SessionManagerLayer<MemoryStore> {
    let same_site = if environment.is_production() {
        tower_sessions::cookie::SameSite::None
    } else {
        tower_sessions::cookie::SameSite::Lax
    };

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(environment.is_production())
        .with_same_site(same_site)
        .with_http_only(true)
        .with_path("/")
}
