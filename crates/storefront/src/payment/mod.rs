//! Payment redirect reconciliation.
//!
//! After an external payment the provider sends the shopper back to the
//! order page with a `success` or `canceled` query indicator. The
//! [`PaymentCallbackReconciler`] surfaces that outcome once per order and
//! hands back the URL without the indicators, so neither a reload nor
//! back-navigation surfaces it again.

mod markers;
mod reconciler;

pub use markers::PaymentMarkers;
pub use reconciler::{
    CANCELED_PARAM, PaymentCallbackReconciler, PaymentNotice, Reconciliation, SUCCESS_PARAM,
    parse_query, strip_indicators,
};
