//! Business logic services.
//!
//! - [`after_auth`] - What happens once a shop completes OAuth
//!   (mark authenticated, register webhooks, pick the redirect)

pub mod after_auth;

pub use after_auth::{AfterAuth, AfterAuthOutcome, AuthGrant};
