//! Hookgate Core - Shared domain types.
//!
//! This crate provides the types shared by the Hookgate server and its tests:
//! - [`WebhookTopic`] - The monitored store event categories
//! - [`ShopDomain`] - A validated `*.myshopify.com` shop hostname
//! - [`DeliveryMethod`] - Where Shopify delivers webhook events
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
