//! # Checkout Backend
//!
//! Everything a [`CheckoutSession`](crate::session::CheckoutSession) asks of
//! the server, behind one trait. [`LocalBackend`] serves it straight from the
//! database; a remote client would implement the same trait over HTTP.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use storefront_core::{CartLine, CouponApplication, ShippingInfo, StockRecord};
use storefront_db::Database;

use crate::auth::SessionAuthority;
use crate::config::CheckoutConfig;
use crate::coordinator::{OrderPlacementCoordinator, PlacementReceipt, PlacementRequest};
use crate::coupon::CouponService;
use crate::error::CheckoutResult;
use crate::notify::NotificationDispatcher;
use crate::payment::PaymentVerifier;

#[async_trait]
pub trait CheckoutBackend: Send + Sync {
    /// The user's server-held cart.
    async fn load_cart(&self, user_id: &str) -> CheckoutResult<Vec<CartLine>>;

    async fn load_shipping_profile(&self, user_id: &str) -> CheckoutResult<Option<ShippingInfo>>;

    async fn save_shipping_profile(&self, user_id: &str, info: &ShippingInfo) -> CheckoutResult<()>;

    async fn lookup_coupon(&self, code: &str) -> CheckoutResult<CouponApplication>;

    /// Advisory stock read; may be stale by the time an order is placed.
    async fn read_stock(&self, product_ids: &[String]) -> CheckoutResult<HashMap<String, StockRecord>>;

    /// Fails with `Auth` unless `token` is a live session for `user_id`.
    async fn verify_session(&self, token: &str, user_id: &str) -> CheckoutResult<()>;

    async fn place_order(&self, token: &str, request: PlacementRequest) -> CheckoutResult<PlacementReceipt>;

    async fn clear_cart(&self, user_id: &str) -> CheckoutResult<()>;
}

/// In-process backend over a [`Database`].
#[derive(Clone)]
pub struct LocalBackend {
    db: Database,
    authority: SessionAuthority,
    coupons: CouponService,
    coordinator: Arc<OrderPlacementCoordinator>,
}

impl LocalBackend {
    pub fn new(db: Database, authority: SessionAuthority, coordinator: Arc<OrderPlacementCoordinator>) -> Self {
        LocalBackend {
            coupons: CouponService::new(&db),
            db,
            authority,
            coordinator,
        }
    }

    /// Wires authority, pricing and notifications from configuration.
    pub fn from_config(db: Database, config: &CheckoutConfig, verifier: Option<Arc<dyn PaymentVerifier>>) -> Self {
        let authority = SessionAuthority::new(config.jwt_secret.clone(), config.session_lifetime_secs);
        let mut coordinator = OrderPlacementCoordinator::new(
            db.clone(),
            authority.clone(),
            config.pricing_engine(),
            NotificationDispatcher::new(&db, config.notifications_enabled),
        );
        if let Some(verifier) = verifier {
            coordinator = coordinator.with_verifier(verifier);
        }
        LocalBackend::new(db, authority, Arc::new(coordinator))
    }

    pub fn authority(&self) -> &SessionAuthority {
        &self.authority
    }

    pub fn coordinator(&self) -> &Arc<OrderPlacementCoordinator> {
        &self.coordinator
    }

    pub fn coupons(&self) -> &CouponService {
        &self.coupons
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl CheckoutBackend for LocalBackend {
    async fn load_cart(&self, user_id: &str) -> CheckoutResult<Vec<CartLine>> {
        Ok(self.db.carts().lines(user_id).await?)
    }

    async fn load_shipping_profile(&self, user_id: &str) -> CheckoutResult<Option<ShippingInfo>> {
        Ok(self.db.shipping_profiles().get(user_id).await?)
    }

    async fn save_shipping_profile(&self, user_id: &str, info: &ShippingInfo) -> CheckoutResult<()> {
        Ok(self.db.shipping_profiles().save(user_id, info).await?)
    }

    async fn lookup_coupon(&self, code: &str) -> CheckoutResult<CouponApplication> {
        self.coupons.apply(Some(code)).await
    }

    async fn read_stock(&self, product_ids: &[String]) -> CheckoutResult<HashMap<String, StockRecord>> {
        Ok(self.db.stock().read(product_ids).await?)
    }

    async fn verify_session(&self, token: &str, user_id: &str) -> CheckoutResult<()> {
        self.authority.authorize(token, user_id).map(|_| ())
    }

    async fn place_order(&self, token: &str, request: PlacementRequest) -> CheckoutResult<PlacementReceipt> {
        self.coordinator.place(token, request).await
    }

    async fn clear_cart(&self, user_id: &str) -> CheckoutResult<()> {
        let removed = self.db.carts().clear(user_id).await?;
        debug!(user_id, removed, "Cart cleared");
        Ok(())
    }
}
