//! # Validation Module
//!
//! Checkout form and input validation.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: CheckoutSession (client)                                      │
//! │  ├── validate_checkout_form: fields, email, phone, terms                │
//! │  └── Fails fast, before any gateway or coordinator call                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Coordinator (server)                                          │
//! │  ├── validate_cart, validate_order_note                                 │
//! │  └── Never trusts the client to have run layer 1                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (stock >= 0)                                                 │
//! │  └── UNIQUE (user_id, payment_reference)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::ShippingInfo;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of the optional order note.
pub const MAX_ORDER_NOTE_LEN: usize = 1000;

pub const MSG_REQUIRED_FIELDS: &str = "Please fill in all required fields";
pub const MSG_INVALID_EMAIL: &str = "Please enter a valid email address";
pub const MSG_INVALID_PHONE: &str = "Please enter a valid phone number";
pub const MSG_TERMS: &str = "Please accept the Terms and Conditions";

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[\d\s-]{10,}$").expect("valid phone regex"))
}

// =============================================================================
// Checkout Form
// =============================================================================

/// A checkout form field that can carry an error flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    FirstName,
    LastName,
    Email,
    Phone,
    Address,
    City,
    State,
    ZipCode,
}

impl FormField {
    /// Every required field, in form order.
    pub const REQUIRED: [FormField; 8] = [
        FormField::FirstName,
        FormField::LastName,
        FormField::Email,
        FormField::Phone,
        FormField::Address,
        FormField::City,
        FormField::State,
        FormField::ZipCode,
    ];

    /// Reads this field from the shipping info.
    pub fn value<'a>(&self, info: &'a ShippingInfo) -> &'a str {
        match self {
            FormField::FirstName => &info.first_name,
            FormField::LastName => &info.last_name,
            FormField::Email => &info.email,
            FormField::Phone => &info.phone,
            FormField::Address => &info.address,
            FormField::City => &info.city,
            FormField::State => &info.state,
            FormField::ZipCode => &info.zip_code,
        }
    }

    pub fn value_mut<'a>(&self, info: &'a mut ShippingInfo) -> &'a mut String {
        match self {
            FormField::FirstName => &mut info.first_name,
            FormField::LastName => &mut info.last_name,
            FormField::Email => &mut info.email,
            FormField::Phone => &mut info.phone,
            FormField::Address => &mut info.address,
            FormField::City => &mut info.city,
            FormField::State => &mut info.state,
            FormField::ZipCode => &mut info.zip_code,
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormField::FirstName => "firstName",
            FormField::LastName => "lastName",
            FormField::Email => "email",
            FormField::Phone => "phone",
            FormField::Address => "address",
            FormField::City => "city",
            FormField::State => "state",
            FormField::ZipCode => "zipCode",
        };
        f.write_str(name)
    }
}

/// Field-level error flags plus one summarized message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[error("{message}")]
pub struct FormErrors {
    pub fields: BTreeSet<FormField>,
    pub message: String,
}

impl FormErrors {
    fn new(fields: impl IntoIterator<Item = FormField>, message: &str) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            message: message.to_string(),
        }
    }

    pub fn has(&self, field: FormField) -> bool {
        self.fields.contains(&field)
    }
}

/// Validates the checkout form.
///
/// ## Order
/// ```text
/// 1. any required field blank ──► flag ALL blank fields, "Please fill in all required fields"
/// 2. email pattern            ──► flag email
/// 3. phone pattern            ──► flag phone
/// 4. terms not accepted       ──► no field flag, terms message
/// ```
/// The first failing step wins; later steps are not evaluated.
pub fn validate_checkout_form(info: &ShippingInfo, terms_accepted: bool) -> Result<(), FormErrors> {
    let blank: Vec<FormField> = FormField::REQUIRED
        .iter()
        .copied()
        .filter(|field| field.value(info).trim().is_empty())
        .collect();

    if !blank.is_empty() {
        return Err(FormErrors::new(blank, MSG_REQUIRED_FIELDS));
    }

    if validate_email(&info.email).is_err() {
        return Err(FormErrors::new([FormField::Email], MSG_INVALID_EMAIL));
    }

    if validate_phone(&info.phone).is_err() {
        return Err(FormErrors::new([FormField::Phone], MSG_INVALID_PHONE));
    }

    if !terms_accepted {
        return Err(FormErrors::new([], MSG_TERMS));
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates an email address against `^[^\s@]+@[^\s@]+\.[^\s@]+$`.
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_email;
///
/// assert!(validate_email("ada@example.ng").is_ok());
/// assert!(validate_email("ada@example").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    if email_pattern().is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@domain.tld".to_string(),
        })
    }
}

/// Validates a phone number: optional `+`, then at least 10 digits, spaces or hyphens.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    if phone_pattern().is_match(phone.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain at least 10 digits".to_string(),
        })
    }
}

/// Validates the optional order note.
///
/// ## Returns
/// The trimmed note, or `None` when blank.
pub fn validate_order_note(note: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if note.chars().count() > MAX_ORDER_NOTE_LEN {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_ORDER_NOTE_LEN,
        });
    }

    Ok(Some(note.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0..=10000).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
