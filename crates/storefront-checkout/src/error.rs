//! # Checkout Error Types
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Caught early   │  │   Payment       │  │   Commit                │  │
//! │  │  (client side)  │  │                 │  │                         │  │
//! │  │  Validation     │  │  Cancelled      │  │  Stock (authoritative)  │  │
//! │  │  Stock (advis.) │  │  Gateway        │  │  Persistence            │  │
//! │  │  EmptyCart      │  │  Timeout        │  │  Network                │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  Auth ──► redirect to login        CouponInvalid ──► zero discount      │
//! │  Busy / InvalidState ──► the session refused to start a second action   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Display` is the log-friendly text; [`CheckoutError::user_message`] is what
//! a shopper sees.

use thiserror::Error;

use storefront_core::{CoreError, CouponRejection, FormErrors};
use storefront_db::DbError;

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Message for any failure that has no better wording for a shopper.
pub const MSG_PLACE_ORDER_FAILED: &str = "Failed to place order. Please try again.";

// =============================================================================
// Stock Error
// =============================================================================

/// A product that cannot be supplied in the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("Sorry, {name} is out of stock (Only {available} left).")]
    InsufficientStock {
        product_id: String,
        name: String,
        available: i64,
    },

    #[error("{name} no longer exists.")]
    ProductNotFound { product_id: String, name: String },
}

impl StockError {
    pub fn product_id(&self) -> &str {
        match self {
            StockError::InsufficientStock { product_id, .. } => product_id,
            StockError::ProductNotFound { product_id, .. } => product_id,
        }
    }

    /// Units still available; zero for a missing product.
    pub fn available(&self) -> i64 {
        match self {
            StockError::InsufficientStock { available, .. } => *available,
            StockError::ProductNotFound { .. } => 0,
        }
    }
}

// =============================================================================
// Checkout Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CheckoutError {
    // =========================================================================
    // Input
    // =========================================================================
    /// Checkout form failed validation; carries field flags.
    #[error("{0}")]
    Validation(#[from] FormErrors),

    /// Request payload is malformed (quantity, note length, cart size).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No items in cart")]
    EmptyCart,

    // =========================================================================
    // Auth
    // =========================================================================
    /// Session token missing, expired, or for another user.
    #[error("Authentication failed: {0}")]
    Auth(String),

    // =========================================================================
    // Stock
    // =========================================================================
    #[error(transparent)]
    Stock(#[from] StockError),

    // =========================================================================
    // Coupon
    // =========================================================================
    /// Non-fatal; checkout continues with no discount.
    #[error("{0}")]
    CouponInvalid(CouponRejection),

    // =========================================================================
    // Payment
    // =========================================================================
    #[error("Payment cancelled")]
    PaymentCancelled,

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Payment gateway did not respond within {secs} seconds")]
    PaymentTimeout { secs: u64 },

    // =========================================================================
    // Commit
    // =========================================================================
    /// Order could not be written after stock and pricing succeeded.
    #[error("Failed to save order: {0}")]
    Persistence(String),

    #[error("Network error: {0}")]
    Network(String),

    // =========================================================================
    // Session
    // =========================================================================
    /// Another submission is still in flight.
    #[error("A checkout is already in progress")]
    Busy,

    #[error("Cannot {action} while checkout is {state}")]
    InvalidState { action: &'static str, state: String },
}

impl CheckoutError {
    /// Text to show the shopper.
    ///
    /// Stock and validation errors carry their own wording; storage and
    /// transport details are never shown.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Validation(errors) => errors.message.clone(),
            CheckoutError::InvalidRequest(msg) => msg.clone(),
            CheckoutError::EmptyCart => "No items in cart".to_string(),
            CheckoutError::Auth(_) => "Session expired. Please log in again".to_string(),
            CheckoutError::Stock(e) => e.to_string(),
            CheckoutError::CouponInvalid(rejection) => rejection.to_string(),
            CheckoutError::PaymentCancelled => "Payment cancelled".to_string(),
            CheckoutError::PaymentGateway(_) | CheckoutError::PaymentTimeout { .. } => {
                "Payment could not be completed. Please try again.".to_string()
            }
            CheckoutError::Persistence(_) => MSG_PLACE_ORDER_FAILED.to_string(),
            CheckoutError::Network(_) => "Network error. Please check your connection and try again.".to_string(),
            CheckoutError::Busy => "Your order is already being processed".to_string(),
            CheckoutError::InvalidState { .. } => MSG_PLACE_ORDER_FAILED.to_string(),
        }
    }

    /// True when the shopper must log in again before retrying.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, CheckoutError::Auth(_))
    }

    /// True for outcomes that should not be escalated as errors.
    pub fn is_benign(&self) -> bool {
        matches!(self, CheckoutError::PaymentCancelled | CheckoutError::CouponInvalid(_))
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "VALIDATION_FAILED",
            CheckoutError::InvalidRequest(_) => "INVALID_REQUEST",
            CheckoutError::EmptyCart => "EMPTY_CART",
            CheckoutError::Auth(_) => "UNAUTHENTICATED",
            CheckoutError::Stock(StockError::InsufficientStock { .. }) => "INSUFFICIENT_STOCK",
            CheckoutError::Stock(StockError::ProductNotFound { .. }) => "PRODUCT_NOT_FOUND",
            CheckoutError::CouponInvalid(_) => "COUPON_INVALID",
            CheckoutError::PaymentCancelled => "PAYMENT_CANCELLED",
            CheckoutError::PaymentGateway(_) => "PAYMENT_GATEWAY_ERROR",
            CheckoutError::PaymentTimeout { .. } => "PAYMENT_TIMEOUT",
            CheckoutError::Persistence(_) => "PERSISTENCE_FAILED",
            CheckoutError::Network(_) => "NETWORK_ERROR",
            CheckoutError::Busy => "BUSY",
            CheckoutError::InvalidState { .. } => "INVALID_STATE",
        }
    }
}

impl From<CoreError> for CheckoutError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EmptyCart => CheckoutError::EmptyCart,
            CoreError::Validation(e) => CheckoutError::InvalidRequest(e.to_string()),
            other => CheckoutError::InvalidRequest(other.to_string()),
        }
    }
}

impl From<DbError> for CheckoutError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionFailed(msg) => CheckoutError::Network(msg),
            DbError::PoolExhausted => CheckoutError::Network("database busy".to_string()),
            other => CheckoutError::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::ValidationError;

    #[test]
    fn test_stock_messages() {
        let out = StockError::InsufficientStock {
            product_id: "p1".into(),
            name: "Ankara Wrap Dress".into(),
            available: 2,
        };
        assert_eq!(out.to_string(), "Sorry, Ankara Wrap Dress is out of stock (Only 2 left).");
        assert_eq!(out.available(), 2);

        let gone = StockError::ProductNotFound {
            product_id: "p9".into(),
            name: "Linen Shirt".into(),
        };
        assert_eq!(gone.to_string(), "Linen Shirt no longer exists.");
        assert_eq!(gone.product_id(), "p9");
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = CheckoutError::Persistence("disk I/O error".into());
        assert_eq!(err.user_message(), MSG_PLACE_ORDER_FAILED);
        assert!(!err.requires_reauthentication());

        let err = CheckoutError::Auth("token expired".into());
        assert!(err.requires_reauthentication());
        assert_eq!(err.code(), "UNAUTHENTICATED");
    }

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(CheckoutError::from(CoreError::EmptyCart), CheckoutError::EmptyCart));

        let err = CheckoutError::from(CoreError::Validation(ValidationError::TooLong {
            field: "note".into(),
            max: 1000,
        }));
        assert!(matches!(err, CheckoutError::InvalidRequest(_)));
    }

    #[test]
    fn test_db_error_mapping() {
        assert!(matches!(CheckoutError::from(DbError::PoolExhausted), CheckoutError::Network(_)));
        assert!(matches!(
            CheckoutError::from(DbError::QueryFailed("x".into())),
            CheckoutError::Persistence(_)
        ));
    }
}
