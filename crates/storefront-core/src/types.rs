//! # Domain Types
//!
//! Core domain types used throughout the storefront checkout.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │    CartLine     │   │      Order      │   │ PaymentSelection│        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  product_id     │   │  id (UUID)      │   │  Card{reference}│        │
//! │  │  price snapshot │   │  lines          │   │  Transfer       │        │
//! │  │  (advisory!)    │   │  status, total  │   └─────────────────┘        │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │  StockRecord    │   │  OrderStatus    │   │  ShippingInfo   │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  available ≥ 0  │   │  Pending        │   │  name, email    │        │
//! │  │  name           │   │  Confirmed      │   │  phone, address │        │
//! │  └─────────────────┘   │  Failed         │   │  state (region) │        │
//! │                        └─────────────────┘   └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot vs. Authority
//! `CartLine.unit_price_snapshot` is whatever the client last displayed.
//! `OrderLine.unit_price` is copied from the catalog at commit time and is the
//! only price that ever reaches a stored order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Cart Line
// =============================================================================

/// One line of a shopper's cart.
///
/// The same product may appear on several lines (size/color variants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,

    /// Display name at the time the item was carted.
    pub name: String,

    /// Client-side price snapshot. Advisory only; never trusted at commit.
    #[ts(type = "string")]
    pub unit_price_snapshot: Money,

    /// Quantity (1..=999).
    pub quantity: i64,

    pub size: Option<String>,
    pub color: Option<String>,
}

impl CartLine {
    /// Snapshot price × quantity, for display estimates only.
    pub fn estimated_total(&self) -> Money {
        self.unit_price_snapshot * self.quantity
    }
}

// =============================================================================
// Shipping Info
// =============================================================================

/// Shipping / contact details collected by the checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    /// State / region; drives the shipping zone lookup.
    pub state: String,
    pub zip_code: String,
}

impl ShippingInfo {
    /// "First Last", used in confirmation notifications.
    pub fn customer_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Region for shipping lookup, `None` when unselected.
    pub fn region(&self) -> Option<&str> {
        let state = self.state.trim();
        if state.is_empty() {
            None
        } else {
            Some(state)
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the shopper pays.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card charge through the gateway widget, settled before commit.
    Card,
    /// Bank transfer, reconciled after the order is placed.
    Transfer,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            other => Err(CoreError::UnknownVariant {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Payment Reference
// =============================================================================

/// Session-scoped identifier handed to the gateway for one card attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct PaymentReference(String);

impl PaymentReference {
    /// A fresh reference: millisecond timestamp plus a random suffix.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::PaymentReference;
    ///
    /// let a = PaymentReference::generate();
    /// let b = PaymentReference::generate();
    /// assert_ne!(a, b);
    /// ```
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        PaymentReference(format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            &suffix[..10]
        ))
    }

    /// Wraps a reference returned by the gateway.
    pub fn new(reference: impl Into<String>) -> Self {
        PaymentReference(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Payment Selection
// =============================================================================

/// The settled payment handed to the coordinator.
///
/// ```text
///   Card { reference } ──► status Confirmed, dedup on (user, reference)
///   Transfer           ──► status Pending, awaits reconciliation
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentSelection {
    Card { reference: PaymentReference },
    Transfer,
}

impl PaymentSelection {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentSelection::Card { .. } => PaymentMethod::Card,
            PaymentSelection::Transfer => PaymentMethod::Transfer,
        }
    }

    pub fn reference(&self) -> Option<&PaymentReference> {
        match self {
            PaymentSelection::Card { reference } => Some(reference),
            PaymentSelection::Transfer => None,
        }
    }

    /// Status a freshly placed order starts in.
    pub fn initial_status(&self) -> OrderStatus {
        match self {
            PaymentSelection::Card { .. } => OrderStatus::Confirmed,
            PaymentSelection::Transfer => OrderStatus::Pending,
        }
    }
}

// =============================================================================
// Payment Attempt
// =============================================================================

/// What happened when the gateway widget resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Cancelled,
    Failed,
}

/// One gateway attempt. Ephemeral; only the reference survives on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentAttempt {
    pub reference: PaymentReference,
    pub method: PaymentMethod,
    pub outcome: PaymentOutcome,
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle of a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed with bank transfer; waiting for reconciliation.
    Pending,
    /// Payment settled.
    Confirmed,
    /// Reconciliation found no payment.
    Failed,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Failed => "failed",
        }
    }

    /// Only `Pending` orders move, and only to a terminal status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed) | (OrderStatus::Pending, OrderStatus::Failed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(CoreError::UnknownVariant {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A line of a placed order, priced from the catalog at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    /// Catalog name at commit time (frozen).
    pub name: String,
    /// Catalog unit price at commit time (frozen).
    #[ts(type = "string")]
    pub unit_price: Money,
    pub quantity: i64,
    #[ts(type = "string")]
    pub line_total: Money,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub lines: Vec<OrderLine>,
    pub shipping_info: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    #[ts(type = "string")]
    pub subtotal: Money,
    #[ts(type = "string")]
    pub discount: Money,
    #[ts(type = "string")]
    pub shipping: Money,
    #[ts(type = "string")]
    pub tax: Money,
    #[ts(type = "string")]
    pub total: Money,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub coupon_code: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock & Catalog
// =============================================================================

/// Authoritative available quantity for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub product_id: String,
    pub available_quantity: i64,
    pub name: String,
}

/// Server-held price for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub product_id: String,
    pub name: String,
    #[ts(type = "string")]
    pub unit_price: Money,
    pub is_active: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_selection_branches() {
        let card = PaymentSelection::Card {
            reference: PaymentReference::new("ref-1"),
        };
        assert_eq!(card.method(), PaymentMethod::Card);
        assert_eq!(card.initial_status(), OrderStatus::Confirmed);
        assert_eq!(card.reference().map(|r| r.as_str()), Some("ref-1"));

        let transfer = PaymentSelection::Transfer;
        assert_eq!(transfer.method(), PaymentMethod::Transfer);
        assert_eq!(transfer.initial_status(), OrderStatus::Pending);
        assert!(transfer.reference().is_none());
    }

    #[test]
    fn test_payment_reference_is_unique() {
        let refs: std::collections::HashSet<_> =
            (0..100).map(|_| PaymentReference::generate()).collect();
        assert_eq!(refs.len(), 100);
    }

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Failed.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_status_and_method_parse() {
        assert_eq!("Confirmed".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
        assert_eq!("transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::Transfer);
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_shipping_info_helpers() {
        let info = ShippingInfo {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            state: "  ".into(),
            ..Default::default()
        };
        assert_eq!(info.customer_name(), "Ada Obi");
        assert_eq!(info.region(), None);
    }

    #[test]
    fn test_shipping_info_uses_camel_case() {
        let json = serde_json::to_value(ShippingInfo {
            zip_code: "100001".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["zipCode"], "100001");
    }
}
