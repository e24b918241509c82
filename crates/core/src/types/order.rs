//! Orders as seen by the storefront.
//!
//! The back-end creates orders; the storefront only submits a request and
//! renders what comes back. An [`Order`] is never mutated locally.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartLines;
use super::id::OrderId;
use super::price::CurrencyCode;
use super::shipping::ShippingRecord;
use super::status::PaymentMethod;

/// Everything the confirmation step accumulated, submitted to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub cart: CartLines,
    pub shipping: ShippingRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
}

/// Response to a successful order creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: OrderId,
}

/// Order payment state reported by the back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// An order detail as rendered on the order page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub lines: CartLines,
    pub total: Decimal,
    #[serde(default)]
    pub currency_code: CurrencyCode,
    #[serde(default)]
    pub payment_status: OrderPaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingRecord>,
    pub created_at: DateTime<Utc>,
}
