//! Core types for Marketstall.
//!
//! This module provides type-safe wrappers for the cart and checkout domain.

pub mod cart;
pub mod checkout;
pub mod id;
pub mod order;
pub mod price;
pub mod shipping;
pub mod status;

pub use cart::{CartLine, CartLines, CartSnapshot, Quantity, QuantityError};
pub use checkout::{CheckoutStep, StepSequence, StepSequenceError};
pub use id::*;
pub use order::{Order, OrderCreated, OrderPaymentStatus, OrderRequest};
pub use price::{CurrencyCode, Price};
pub use shipping::{FieldError, ShippingForm, ShippingRecord, ValidationErrors};
pub use status::*;
