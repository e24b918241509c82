//! Checkout steps and the configured order in which they run.
//!
//! Steps are addressed two ways: by a 1-based position in the
//! [`StepSequence`] (the in-memory cursor) and by a query-parameter value
//! (the shareable URL form). The sequence is the only thing that maps one to
//! the other.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named checkout step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckoutStep {
    #[serde(rename = "cart")]
    Cart,
    #[serde(rename = "shippingDetails")]
    ShippingDetails,
    #[serde(rename = "payment")]
    PaymentMethod,
    #[serde(rename = "confirmation")]
    Confirmation,
}

impl CheckoutStep {
    /// The value carried by the `step` query parameter.
    #[must_use]
    pub const fn query_value(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::ShippingDetails => "shippingDetails",
            Self::PaymentMethod => "payment",
            Self::Confirmation => "confirmation",
        }
    }

    /// Parse a `step` query parameter value. Unknown values yield `None`.
    #[must_use]
    pub fn from_query_value(value: &str) -> Option<Self> {
        match value {
            "cart" => Some(Self::Cart),
            "shippingDetails" => Some(Self::ShippingDetails),
            "payment" => Some(Self::PaymentMethod),
            "confirmation" => Some(Self::Confirmation),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.query_value())
    }
}

/// Reasons a custom step sequence is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepSequenceError {
    #[error("step sequence must start with the cart step")]
    MustStartWithCart,
    #[error("step sequence must end with the confirmation step")]
    MustEndWithConfirmation,
    #[error("step sequence must include the shipping details step")]
    MissingShipping,
    #[error("step {0} appears more than once")]
    Duplicate(CheckoutStep),
}

/// The configured, ordered list of checkout steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSequence {
    steps: Vec<CheckoutStep>,
}

impl StepSequence {
    /// The standard sequence.
    ///
    /// When payment is delegated to an external provider the payment-method
    /// step is omitted: cart, shipping details, confirmation.
    #[must_use]
    pub fn standard(external_payment: bool) -> Self {
        let steps = if external_payment {
            vec![
                CheckoutStep::Cart,
                CheckoutStep::ShippingDetails,
                CheckoutStep::Confirmation,
            ]
        } else {
            vec![
                CheckoutStep::Cart,
                CheckoutStep::ShippingDetails,
                CheckoutStep::PaymentMethod,
                CheckoutStep::Confirmation,
            ]
        };
        Self { steps }
    }

    /// Build a sequence from an explicit list.
    ///
    /// # Errors
    ///
    /// The list must start with cart, end with confirmation, contain the
    /// shipping step and name each step at most once.
    pub fn custom(steps: Vec<CheckoutStep>) -> Result<Self, StepSequenceError> {
        if steps.first() != Some(&CheckoutStep::Cart) {
            return Err(StepSequenceError::MustStartWithCart);
        }
        if steps.last() != Some(&CheckoutStep::Confirmation) {
            return Err(StepSequenceError::MustEndWithConfirmation);
        }
        if !steps.contains(&CheckoutStep::ShippingDetails) {
            return Err(StepSequenceError::MissingShipping);
        }
        for (index, step) in steps.iter().enumerate() {
            if steps.iter().skip(index + 1).any(|other| other == step) {
                return Err(StepSequenceError::Duplicate(*step));
            }
        }
        Ok(Self { steps })
    }

    /// Number of steps (the largest valid cursor value).
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always `false`: every valid sequence has at least three steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at a 1-based cursor position.
    #[must_use]
    pub fn step_at(&self, position: usize) -> Option<CheckoutStep> {
        position
            .checked_sub(1)
            .and_then(|index| self.steps.get(index))
            .copied()
    }

    /// 1-based position of a step, if it is configured.
    #[must_use]
    pub fn position_of(&self, step: CheckoutStep) -> Option<usize> {
        self.steps
            .iter()
            .position(|candidate| *candidate == step)
            .map(|index| index + 1)
    }

    #[must_use]
    pub fn contains(&self, step: CheckoutStep) -> bool {
        self.steps.contains(&step)
    }

    #[must_use]
    pub fn steps(&self) -> &[CheckoutStep] {
        &self.steps
    }
}

impl Default for StepSequence {
    fn default() -> Self {
        Self::standard(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_sequences() {
        let delegated = StepSequence::standard(true);
        assert_eq!(delegated.len(), 3);
        assert!(!delegated.contains(CheckoutStep::PaymentMethod));

        let local = StepSequence::standard(false);
        assert_eq!(local.len(), 4);
        assert_eq!(local.position_of(CheckoutStep::PaymentMethod), Some(3));
    }

    #[test]
    fn test_step_at_is_one_based() {
        let seq = StepSequence::standard(true);
        assert_eq!(seq.step_at(0), None);
        assert_eq!(seq.step_at(1), Some(CheckoutStep::Cart));
        assert_eq!(seq.step_at(3), Some(CheckoutStep::Confirmation));
        assert_eq!(seq.step_at(4), None);
    }

    #[test]
    fn test_query_values() {
        for step in StepSequence::standard(false).steps() {
            assert_eq!(CheckoutStep::from_query_value(step.query_value()), Some(*step));
        }
        assert_eq!(CheckoutStep::from_query_value("shipping"), None);
    }

    #[test]
    fn test_custom_sequence_validation() {
        assert_eq!(
            StepSequence::custom(vec![CheckoutStep::ShippingDetails, CheckoutStep::Confirmation]),
            Err(StepSequenceError::MustStartWithCart)
        );
        assert_eq!(
            StepSequence::custom(vec![CheckoutStep::Cart, CheckoutStep::Confirmation]),
            Err(StepSequenceError::MissingShipping)
        );
        assert_eq!(
            StepSequence::custom(vec![
                CheckoutStep::Cart,
                CheckoutStep::ShippingDetails,
                CheckoutStep::ShippingDetails,
                CheckoutStep::Confirmation,
            ]),
            Err(StepSequenceError::Duplicate(CheckoutStep::ShippingDetails))
        );
        assert!(
            StepSequence::custom(vec![
                CheckoutStep::Cart,
                CheckoutStep::ShippingDetails,
                CheckoutStep::Confirmation,
            ])
            .is_ok()
        );
    }
}
