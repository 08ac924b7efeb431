//! Core types for Hookgate.
//!
//! This module provides type-safe wrappers for the embedded app's domain concepts.

pub mod delivery;
pub mod shop;
pub mod topic;

pub use delivery::{DeliveryError, DeliveryMethod};
pub use shop::{ShopDomain, ShopDomainError};
pub use topic::{UnknownTopic, WebhookTopic};
