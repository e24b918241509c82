//! Marketstall Core - Shared domain types.
//!
//! This crate provides the types shared by every Marketstall component:
//! - `storefront` - Public storefront and its cart/checkout engine
//! - `integration-tests` - End-to-end router tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no session access. Anything that needs a network call or a
//! persisted value lives in the storefront crate behind a trait.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, cart lines, checkout steps, shipping records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
