//! # Money Module
//!
//! `Money` and `Rate`: exact decimal arithmetic for checkout totals.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    9000 × 0.075 = 674.9999999999999   ❌ WRONG!                         │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal                                             │
//! │    9000 × 0.075 = 675.000 exactly                                       │
//! │    Totals keep their natural precision; the ONLY rounding step is      │
//! │    the conversion to minor units for the payment gateway (ceiling).    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use storefront_core::money::{Money, Rate};
//!
//! let price = Money::from_major(4_500);
//! let line = price * 2u32;                         // ₦9,000
//! let tax = line.apply_rate(Rate::from_bps(750));  // 7.5% = ₦675
//! assert_eq!(tax, Money::from_major(675));
//! assert_eq!((line + tax).to_minor_units_ceil().unwrap(), 967_500);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Minor units per major unit (kobo per naira).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in major currency units (naira).
///
/// ## Design Decisions
/// - **Decimal, not i64 kobo**: discounts and tax are fractional rates, and the
///   engine must not round internally
/// - **Serialized as a string**: `"1500.00"` survives JSON without float loss
/// - **Stored as TEXT** in SQLite for the same reason
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  catalog price ──► OrderLine.line_total ──► subtotal                    │
/// │                                                │                        │
/// │                     coupon rate ──► discount ──┤                        │
/// │                                                ▼                        │
/// │        shipping zone ──► fee ──► total ◄── tax (7.5% of discounted)     │
/// │                                    │                                    │
/// │                                    ▼                                    │
/// │                     to_minor_units_ceil() ──► gateway amount (kobo)     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps an exact decimal amount in major units.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a whole-unit amount (`from_major(1500)` is ₦1,500).
    #[inline]
    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Creates an amount from minor units (`from_minor(150_050)` is ₦1,500.50).
    #[inline]
    pub fn from_minor(minor: i64) -> Self {
        Money(Decimal::new(minor, 2))
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// The underlying decimal value.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies the amount by a fractional rate (discount, tax).
    ///
    /// No rounding is applied; the result keeps the full precision of
    /// `amount × rate`.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::{Money, Rate};
    ///
    /// let subtotal = Money::from_major(10_000);
    /// let discount = subtotal.apply_rate(Rate::from_percentage(10.into()));
    /// assert_eq!(discount, Money::from_major(1_000));
    /// ```
    #[inline]
    pub fn apply_rate(&self, rate: Rate) -> Money {
        Money(self.0 * rate.fraction())
    }

    /// Converts to minor units (kobo) rounding **up**.
    ///
    /// Gateway amounts must never undercharge, so any fractional kobo is
    /// rounded towards positive infinity: ₦10.001 becomes 1001 kobo.
    ///
    /// ## Returns
    /// `CoreError::AmountOutOfRange` when the result does not fit an `i64`.
    pub fn to_minor_units_ceil(&self) -> CoreResult<i64> {
        self.0
            .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))
            .map(|minor| minor.ceil())
            .and_then(|minor| minor.to_i64())
            .ok_or_else(|| CoreError::AmountOutOfRange {
                amount: self.0.to_string(),
            })
    }

    /// Parses a stored decimal string (`"1500.00"`).
    pub fn parse(text: &str) -> CoreResult<Money> {
        Decimal::from_str(text.trim())
            .map(Money)
            .map_err(|e| CoreError::InvalidAmount {
                value: text.to_string(),
                reason: e.to_string(),
            })
    }

    /// Canonical string form used for storage.
    pub fn to_storage_string(&self) -> String {
        self.0.normalize().to_string()
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// A fractional rate: tax rate, coupon percentage.
///
/// Stored as the fraction itself, so 7.5% is `0.075`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    /// Basis points: 1 bps = 0.01%, so 750 bps = 7.5%.
    #[inline]
    pub fn from_bps(bps: u32) -> Self {
        Rate(Decimal::new(i64::from(bps), 4))
    }

    /// A percentage value: `from_percentage(7.5)` = 0.075.
    #[inline]
    pub fn from_percentage(percent: Decimal) -> Self {
        Rate(percent / Decimal::ONE_HUNDRED)
    }

    /// A raw fraction: `from_fraction(0.1)` = 10%.
    #[inline]
    pub const fn from_fraction(fraction: Decimal) -> Self {
        Rate(fraction)
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(Decimal::ZERO)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub const fn fraction(&self) -> Decimal {
        self.0
    }

    /// The rate as a percentage (for display).
    #[inline]
    pub fn percentage(&self) -> Decimal {
        (self.0 * Decimal::ONE_HUNDRED).normalize()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows naira with two decimals; UI formatting is the client's job.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        write!(f, "{}₦{:.2}", sign, self.0.abs())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percentage())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a line quantity.
impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        Money(self.0 * Decimal::from(qty))
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * Decimal::from(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
