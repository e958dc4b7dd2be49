//! # Repository Module
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pool-backed repositories            Transaction-scoped functions       │
//! │  (db.orders(), db.stock(), ...)      (take &mut SqliteConnection)       │
//! │                                                                         │
//! │  StockLedger::read                   stock::reserve_and_debit           │
//! │  CouponRepository::find_by_code      catalog::prices_in                 │
//! │  OrderRepository::find_by_reference  order::insert_order               │
//! │  CartRepository / profiles / outbox                                     │
//! │                                                                         │
//! │  The right-hand column only ever runs inside the coordinator's          │
//! │  single order transaction; it never opens its own connection.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod order;
pub mod outbox;
pub mod profile;
pub mod stock;

pub use cart::CartRepository;
pub use catalog::{CatalogRepository, NewProduct};
pub use coupon::CouponRepository;
pub use order::OrderRepository;
pub use outbox::{NotificationOutboxEntry, NotificationOutboxRepository};
pub use profile::ShippingProfileRepository;
pub use stock::{DebitOutcome, StockLedger};
