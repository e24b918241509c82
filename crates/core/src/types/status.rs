//! Roles, payment methods and payment outcomes.

use serde::{Deserialize, Serialize};

use super::id::AccountId;

/// Account role as reported by the profile endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper.
    #[serde(alias = "user")]
    Customer,
    /// Store administrator.
    Admin,
    /// Any role this storefront does not know about. Never grants admin access.
    #[serde(other)]
    Unknown,
}

impl Role {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The authenticated account as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: AccountId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Payment method chosen on the payment-method step.
///
/// Only used when payment is not delegated to an external provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    BankTransfer,
    CardOnDelivery,
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            "bank_transfer" => Ok(Self::BankTransfer),
            "card_on_delivery" => Ok(Self::CardOnDelivery),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Result of an external payment redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Canceled,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_deserialization() {
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert!(role.is_admin());

        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::Customer);

        let role: Role = serde_json::from_str("\"superuser\"").unwrap();
        assert_eq!(role, Role::Unknown);
        assert!(!role.is_admin());
    }

    #[test]
    fn test_payment_method_from_str() {
        assert_eq!(
            "bank_transfer".parse::<PaymentMethod>(),
            Ok(PaymentMethod::BankTransfer)
        );
        assert!("crypto".parse::<PaymentMethod>().is_err());
    }
}
