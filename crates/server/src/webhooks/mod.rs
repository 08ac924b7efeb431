//! Webhooks in both directions.
//!
//! - [`subscriptions`] - Registering the monitored topics for a shop after OAuth
//! - [`delivery`] - Verifying and dispatching deliveries posted to `/webhooks`

pub mod delivery;
pub mod subscriptions;

pub use delivery::{
    InvalidateShop, WebhookDelivery, WebhookError, WebhookHandler, WebhookProcessor,
};
pub use subscriptions::{
    RegistrationResponse, SubscriptionClient, SubscriptionError, TopicOutcome,
    WebhookSubscriptionManager, WebhookSubscriptionRequest, WebhookSubscriptionResult,
};
