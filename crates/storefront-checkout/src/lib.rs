//! # storefront-checkout: Checkout Services
//!
//! Turns a cart into a paid, stock-safe order.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Checkout Architecture                    │
//! │                                                                         │
//! │  ┌───────────────────────────┐        ┌────────────────────────────┐    │
//! │  │  CheckoutSession (client) │        │  storefront-api (HTTP)     │    │
//! │  │  state machine, toasts    │        │  POST /api/orders ...      │    │
//! │  └─────────────┬─────────────┘        └──────────────┬─────────────┘    │
//! │                │ CheckoutBackend                     │                  │
//! │  ┌─────────────▼─────────────────────────────────────▼─────────────┐    │
//! │  │            ★ storefront-checkout (THIS CRATE) ★                 │    │
//! │  │                                                                 │    │
//! │  │  SessionAuthority   CouponService   PaymentGatewayAdapter       │    │
//! │  │           OrderPlacementCoordinator   NotificationDispatcher    │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │           storefront-core (pricing)   storefront-db (SQLite)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Layered configuration
//! - [`auth`] - Session tokens
//! - [`coupon`] - Coupon lookup and evaluation
//! - [`payment`] - Card / transfer branching and the widget bridge
//! - [`coordinator`] - The atomic order commit
//! - [`notify`] - Order confirmation outbox
//! - [`backend`] - What a session needs from the server
//! - [`session`] - The checkout state machine
//! - [`error`] - Checkout error taxonomy

pub mod auth;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod coupon;
pub mod error;
pub mod notify;
pub mod payment;
pub mod session;

pub use auth::{extract_bearer_token, SessionAuthority, SessionClaims};
pub use backend::{CheckoutBackend, LocalBackend};
pub use config::{CheckoutConfig, ConfigError};
pub use coordinator::{OrderPlacementCoordinator, PlacementReceipt, PlacementRequest};
pub use coupon::CouponService;
pub use error::{CheckoutError, CheckoutResult, StockError};
pub use notify::{LogSender, NotificationDispatcher, NotificationSender, OrderConfirmation};
pub use payment::{
    GatewayCallback, GatewayWidgetConfig, PaymentGateway, PaymentGatewayAdapter, PaymentVerifier,
    WidgetBridge, WidgetRequest,
};
pub use session::{CheckoutSession, CheckoutState, Notice, NoticeLevel, ProcessingFlag};
