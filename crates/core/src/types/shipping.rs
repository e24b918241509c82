//! Shipping details collected during checkout.
//!
//! [`ShippingForm::validate`] is the single validation authority for the
//! shipping step. Both the form's own submit and the step's "Next" control
//! go through it; nothing else decides whether shipping data is valid.

use serde::{Deserialize, Serialize};

const MAX_NAME_LENGTH: usize = 120;
const MAX_ADDRESS_LENGTH: usize = 200;
const MAX_EMAIL_LENGTH: usize = 254;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Raw shipping input as submitted by the shopper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub notes: String,
}

/// Validated shipping details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRecord {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field errors from one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{} invalid field(s): {}", .errors.len(), field_names(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

fn field_names(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.field)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Whether a particular field was rejected.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ShippingForm {
    /// Validate the form and produce a [`ShippingRecord`].
    ///
    /// Every field is checked so the shopper sees all problems at once.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing every rejected field.
    pub fn validate(&self) -> Result<ShippingRecord, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let full_name = required(&mut errors, "fullName", &self.full_name, MAX_NAME_LENGTH);
        let address_line1 = required(
            &mut errors,
            "addressLine1",
            &self.address_line1,
            MAX_ADDRESS_LENGTH,
        );
        let city = required(&mut errors, "city", &self.city, MAX_NAME_LENGTH);
        let country = required(&mut errors, "country", &self.country, MAX_NAME_LENGTH);

        let email = self.email.trim();
        if let Err(message) = check_email(email) {
            errors.push("email", message);
        }

        let phone = normalize_phone(&self.phone);
        match phone.as_deref() {
            None => errors.push("phone", "phone number is required"),
            Some(digits) => {
                let count = digits.chars().filter(char::is_ascii_digit).count();
                if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&count) {
                    errors.push(
                        "phone",
                        format!(
                            "phone number must have {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits"
                        ),
                    );
                }
            }
        }

        let address_line2 = optional(&self.address_line2);
        if address_line2
            .as_ref()
            .is_some_and(|a| a.chars().count() > MAX_ADDRESS_LENGTH)
        {
            errors.push(
                "addressLine2",
                format!("must be at most {MAX_ADDRESS_LENGTH} characters"),
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ShippingRecord {
            full_name,
            email: email.to_owned(),
            phone: phone.unwrap_or_default(),
            address_line1,
            address_line2,
            city,
            postal_code: optional(&self.postal_code),
            country,
            notes: optional(&self.notes),
        })
    }
}

fn required(errors: &mut ValidationErrors, field: &'static str, value: &str, max: usize) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(field, "this field is required");
    } else if value.chars().count() > max {
        errors.push(field, format!("must be at most {max} characters"));
    }
    value.to_owned()
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn check_email(email: &str) -> Result<(), &'static str> {
    if email.is_empty() {
        return Err("email is required");
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err("email is too long");
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            if domain.starts_with('.') || domain.ends_with('.') || domain.contains('@') {
                Err("email domain is invalid")
            } else {
                Ok(())
            }
        }
        Some(_) => Err("email domain is invalid"),
        None => Err("email must contain an @ symbol"),
    }
}

/// Strip separators, keeping an optional leading `+`.
fn normalize_phone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut normalized = String::with_capacity(raw.len());
    for (index, c) in raw.chars().enumerate() {
        match c {
            '+' if index == 0 => normalized.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => normalized.push(c),
        }
    }
    Some(normalized)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_form() -> ShippingForm {
        ShippingForm {
            full_name: "Layla Haddad".to_string(),
            email: "layla@example.com".to_string(),
            phone: "+966 (55) 123-4567".to_string(),
            address_line1: "12 King Fahd Rd".to_string(),
            address_line2: String::new(),
            city: "Riyadh".to_string(),
            postal_code: " 12211 ".to_string(),
            country: "SA".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_valid_form_produces_record() {
        let record = valid_form().validate().unwrap();
        assert_eq!(record.phone, "+966551234567");
        assert_eq!(record.postal_code.as_deref(), Some("12211"));
        assert_eq!(record.address_line2, None);
    }

    #[test]
    fn test_reports_every_invalid_field() {
        let form = ShippingForm {
            email: "not-an-email".to_string(),
            ..ShippingForm::default()
        };
        let errors = form.validate().unwrap_err();

        for field in ["fullName", "addressLine1", "city", "country", "email", "phone"] {
            assert!(errors.has(field), "expected error for {field}");
        }
    }

    #[test]
    fn test_phone_digit_bounds() {
        let mut form = valid_form();
        form.phone = "12-34".to_string();
        assert!(form.validate().unwrap_err().has("phone"));
    }

    #[test]
    fn test_email_domain_checks() {
        assert!(check_email("a@b.co").is_ok());
        assert!(check_email("a@localhost").is_err());
        assert!(check_email("@b.co").is_err());
        assert!(check_email("a@.co").is_err());
    }

    #[test]
    fn test_error_display_lists_fields() {
        let mut form = valid_form();
        form.city = "  ".to_string();
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), "1 invalid field(s): city");
    }
}
