//! # Coupons
//!
//! Discount codes and how they turn into a discount rate.
//!
//! ```text
//!   lookup(code) ──► Option<Coupon> ──► evaluate() ──► CouponApplication
//!                                                       ├── Applied { rate }
//!                                                       └── NotApplied(reason)
//! ```
//!
//! A coupon that cannot be applied is never a hard failure: checkout simply
//! proceeds with a zero discount. Only percentage coupons are honored today;
//! fixed-amount coupons have their own variant but evaluate to
//! `NotApplied(UnsupportedType)`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{Money, Rate};

/// Normalizes a shopper-entered code (trimmed, as typed otherwise).
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

// =============================================================================
// Discount
// =============================================================================

/// What a coupon takes off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "discountType", rename_all = "snake_case")]
pub enum Discount {
    /// Percentage off the subtotal, e.g. `10` for 10%.
    Percentage {
        #[serde(rename = "discountValue")]
        value: Decimal,
    },
    /// Fixed amount off. Defined by the data shape, not yet honored.
    Amount {
        #[serde(rename = "discountValue")]
        value: Money,
    },
    /// Any other stored discount type.
    Unsupported {
        kind: String,
        #[serde(rename = "discountValue")]
        value: Decimal,
    },
}

impl Discount {
    /// Builds a discount from the stored `(discount_type, discount_value)` pair.
    pub fn from_parts(kind: &str, value: Decimal) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "percentage" => Discount::Percentage { value },
            "amount" => Discount::Amount {
                value: Money::new(value),
            },
            _ => Discount::Unsupported {
                kind: kind.to_string(),
                value,
            },
        }
    }

    /// Stored discount type name.
    pub fn kind(&self) -> &str {
        match self {
            Discount::Percentage { .. } => "percentage",
            Discount::Amount { .. } => "amount",
            Discount::Unsupported { kind, .. } => kind,
        }
    }

    /// Stored discount value.
    pub fn value(&self) -> Decimal {
        match self {
            Discount::Percentage { value } => *value,
            Discount::Amount { value } => value.amount(),
            Discount::Unsupported { value, .. } => *value,
        }
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// An issued coupon. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    #[serde(flatten)]
    pub discount: Discount,
    pub is_active: bool,
}

/// Why a coupon did not change the price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    NotFound,
    Inactive,
    UnsupportedType { kind: String },
    InvalidValue,
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponRejection::NotFound => f.write_str("Invalid coupon code"),
            CouponRejection::Inactive => f.write_str("This coupon is no longer active"),
            CouponRejection::UnsupportedType { kind } => {
                write!(f, "Coupons of type '{}' are not supported", kind)
            }
            CouponRejection::InvalidValue => f.write_str("Invalid coupon code"),
        }
    }
}

/// Outcome of evaluating a coupon for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CouponApplication {
    Applied { code: String, rate: Rate },
    NotApplied(CouponRejection),
}

impl CouponApplication {
    /// Discount rate to feed the pricing engine; zero when not applied.
    pub fn rate(&self) -> Rate {
        match self {
            CouponApplication::Applied { rate, .. } => *rate,
            CouponApplication::NotApplied(_) => Rate::zero(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, CouponApplication::Applied { .. })
    }

    /// Code to record on the order, only when the discount actually applied.
    pub fn applied_code(&self) -> Option<&str> {
        match self {
            CouponApplication::Applied { code, .. } => Some(code),
            CouponApplication::NotApplied(_) => None,
        }
    }
}

impl Coupon {
    /// Turns this coupon into a discount rate.
    ///
    /// ## Rules
    /// - inactive coupons are rejected
    /// - percentage values must lie in `(0, 100]`
    /// - amount and unknown types are `UnsupportedType`
    pub fn evaluate(&self) -> CouponApplication {
        if !self.is_active {
            return CouponApplication::NotApplied(CouponRejection::Inactive);
        }

        match &self.discount {
            Discount::Percentage { value } => {
                if *value <= Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
                    return CouponApplication::NotApplied(CouponRejection::InvalidValue);
                }
                CouponApplication::Applied {
                    code: self.code.clone(),
                    rate: Rate::from_percentage(*value),
                }
            }
            other => CouponApplication::NotApplied(CouponRejection::UnsupportedType {
                kind: other.kind().to_string(),
            }),
        }
    }
}

/// Evaluates an optional lookup result; a missing coupon is `NotFound`.
pub fn evaluate(coupon: Option<&Coupon>) -> CouponApplication {
    match coupon {
        Some(coupon) => coupon.evaluate(),
        None => CouponApplication::NotApplied(CouponRejection::NotFound),
    }
}
