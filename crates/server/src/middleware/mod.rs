//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request context (request id and shop on the span and Sentry scope)
//! 4. Session layer (OAuth `state` cookie)
//! 5. Frame ancestors (page routes only)

pub mod frame_ancestors;
pub mod request_context;
pub mod session;

pub use frame_ancestors::frame_ancestors_middleware;
pub use request_context::{REQUEST_ID_HEADER, request_context_middleware};
pub use session::{OAUTH_STATE_KEY, create_session_layer};
