//! # storefront-db: Database Layer for the Storefront Checkout
//!
//! SQLite storage through sqlx: catalog and stock, coupons, orders, carts,
//! saved shipping profiles and the notification outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Checkout Data Flow                                  │
//! │                                                                         │
//! │  OrderPlacementCoordinator::place                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                  storefront-db (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │    │
//! │  │   │   (pool.rs)   │    │ StockLedger   │    │  (embedded)  │    │    │
//! │  │   │ SqlitePool    │◄───│ OrderRepo     │    │ 001_checkout │    │    │
//! │  │   │ begin()       │    │ CouponRepo... │    │              │    │    │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL)                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//! ```rust,ignore
//! use storefront_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./checkout.db")).await?;
//! let stock = db.stock().read(&["p1".to_string()]).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::*;

/// Initializes tracing for binaries in this crate (the seed tool).
///
/// ## Log Levels
/// Override with `RUST_LOG`, e.g. `RUST_LOG=storefront_db=trace`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug,sqlx=warn"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
