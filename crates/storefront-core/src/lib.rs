//! # storefront-core: Pure Checkout Logic
//!
//! Everything about a checkout that can be decided without touching a
//! database, a network or a clock-driven gateway.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Checkout Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │              Web client / HTTP API (storefront-api)             │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │   storefront-checkout: session, payment, coordinator            │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │    │
//! │  │                                                                 │    │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ ┌──────────┐  │    │
//! │  │   │  money  │ │ pricing │ │ shipping │ │ coupon │ │validation│  │    │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └────────┘ └──────────┘  │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │            storefront-db: SQLite, stock ledger, orders          │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CartLine, Order, PaymentSelection, ...)
//! - [`money`] - Decimal `Money` and `Rate`
//! - [`shipping`] - Region → flat fee table
//! - [`coupon`] - Coupon evaluation
//! - [`pricing`] - The pricing engine
//! - [`cart`] - Cart grouping and shape checks
//! - [`validation`] - Checkout form and input validation
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod coupon;
pub mod error;
pub mod money;
pub mod pricing;
pub mod shipping;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use coupon::{Coupon, CouponApplication, CouponRejection, Discount};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use pricing::{PriceBreakdown, PricedLine, PricingEngine};
pub use shipping::{ShippingRateTable, ShippingZone};
pub use types::*;
pub use validation::{FormErrors, FormField};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single cart line.
///
/// Guards against typos like 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;
