//! # Order Placement Coordinator
//!
//! The atomic commit: authenticate, debit stock, re-price, persist.
//!
//! ## Placement Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      place(token, request)                              │
//! │                                                                         │
//! │  OUTSIDE the transaction                                                │
//! │  1. verify session token, subject == userId                             │
//! │  2. validate cart / note / shipping info, group quantities by product   │
//! │  3. card: (userId, reference) already ordered? ──► replay receipt       │
//! │  4. coupon lookup ──► discount rate (0 when not applied)                │
//! │  5. card + verifier: amount actually charged                            │
//! │                                                                         │
//! │  INSIDE one SQLite transaction                                          │
//! │  6. reserve_and_debit per product, sorted ids                           │
//! │       InsufficientStock / NotFound ──► return (drop = rollback)         │
//! │  7. catalog prices for the same ids ──► PricingEngine::quote            │
//! │  8. insert order + lines                                                │
//! │       unique (userId, reference) ──► rollback, replay existing order    │
//! │  9. COMMIT                                                              │
//! │                                                                         │
//! │  AFTER commit                                                           │
//! │  10. queue order_confirmation (spawned, never awaited)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No gateway call happens while the transaction is open. Nothing is retried
//! here; a failed placement is reported and retry is the caller's choice.
//!
//! A card order that fails anywhere from step 6 on (stock, pricing,
//! undercharge, insert or commit) is logged at error level with the reference. There is no automatic refund; those
//! charges are reconciled by hand.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use storefront_core::cart::{group_quantities, validate_cart};
use storefront_core::validation::{validate_checkout_form, validate_order_note};
use storefront_core::{
    CartLine, CoreError, CouponApplication, Money, Order, OrderLine, OrderStatus, PaymentMethod, PaymentReference,
    PaymentSelection, PriceBreakdown, PricedLine, PricingEngine, ShippingInfo,
};
use storefront_db::repository::catalog::prices_in;
use storefront_db::repository::order::insert_order;
use storefront_db::repository::stock::reserve_and_debit;
use storefront_db::{Database, DbError, DebitOutcome};

use crate::auth::SessionAuthority;
use crate::coupon::CouponService;
use crate::error::{CheckoutError, CheckoutResult, StockError};
use crate::notify::NotificationDispatcher;
use crate::payment::PaymentVerifier;

// =============================================================================
// Request / Receipt
// =============================================================================

/// The order placement call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRequest {
    pub user_id: String,
    pub line_items: Vec<CartLine>,
    pub shipping_info: ShippingInfo,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_reference: Option<PaymentReference>,
    /// What the client displayed; recomputed and never trusted.
    #[serde(default)]
    pub shipping_fee: Option<Money>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

impl PlacementRequest {
    /// The payment variant this request describes.
    ///
    /// Card requires a reference. A reference sent with a transfer is ignored.
    pub fn selection(&self) -> CheckoutResult<PaymentSelection> {
        match (self.payment_method, &self.payment_reference) {
            (PaymentMethod::Card, Some(reference)) if !reference.as_str().trim().is_empty() => {
                Ok(PaymentSelection::Card {
                    reference: reference.clone(),
                })
            }
            (PaymentMethod::Card, _) => Err(CheckoutError::InvalidRequest(
                "Card payments require a payment reference".into(),
            )),
            (PaymentMethod::Transfer, reference) => {
                if let Some(reference) = reference {
                    debug!(reference = %reference, "Ignoring payment reference on transfer order");
                }
                Ok(PaymentSelection::Transfer)
            }
        }
    }
}

/// Result of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementReceipt {
    pub order_id: String,
    pub status: OrderStatus,
    pub total: Money,
    /// True when an earlier order with the same payment reference was returned.
    pub replayed: bool,
}

impl PlacementReceipt {
    fn for_order(order: &Order, replayed: bool) -> Self {
        PlacementReceipt {
            order_id: order.id.clone(),
            status: order.status,
            total: order.total,
            replayed,
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Clone)]
pub struct OrderPlacementCoordinator {
    db: Database,
    authority: SessionAuthority,
    pricing: PricingEngine,
    coupons: CouponService,
    notifications: NotificationDispatcher,
    verifier: Option<Arc<dyn PaymentVerifier>>,
}

impl OrderPlacementCoordinator {
    pub fn new(
        db: Database,
        authority: SessionAuthority,
        pricing: PricingEngine,
        notifications: NotificationDispatcher,
    ) -> Self {
        let coupons = CouponService::new(&db);
        OrderPlacementCoordinator {
            db,
            authority,
            pricing,
            coupons,
            notifications,
            verifier: None,
        }
    }

    /// Verifies card references server-side before any stock is debited.
    pub fn with_verifier(mut self, verifier: Arc<dyn PaymentVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    /// Places an order. See the module docs for the sequence.
    ///
    /// ## Errors
    /// - `Auth` when the token is invalid, expired or for another user
    /// - `EmptyCart` / `InvalidRequest` / `Validation` for malformed input
    /// - `Stock` for the first product that cannot be supplied; nothing is debited
    /// - `PaymentGateway` when a configured verifier rejects the reference
    /// - `Persistence` when the order cannot be written
    pub async fn place(&self, session_token: &str, request: PlacementRequest) -> CheckoutResult<PlacementReceipt> {
        self.authority.authorize(session_token, &request.user_id)?;

        validate_cart(&request.line_items)?;
        let note = validate_order_note(request.note.as_deref()).map_err(CoreError::from)?;
        validate_checkout_form(&request.shipping_info, true)?;
        let selection = request.selection()?;
        let quantities = group_quantities(&request.line_items);

        if let Some(reference) = selection.reference() {
            if let Some(existing) = self.db.orders().find_by_reference(&request.user_id, reference.as_str()).await? {
                info!(
                    order_id = %existing.id,
                    user_id = %request.user_id,
                    reference = %reference,
                    "Replaying order for repeated payment reference"
                );
                return Ok(PlacementReceipt::for_order(&existing, true));
            }
        }

        let coupon = self.coupons.apply(request.coupon_code.as_deref()).await?;

        let charged_minor_units = match (selection.reference(), &self.verifier) {
            (Some(reference), Some(verifier)) => Some(verifier.verify(reference).await?),
            _ => None,
        };

        let placed = self
            .commit_order(&request, &quantities, &selection, &coupon, note, charged_minor_units)
            .await;
        if let Err(e) = &placed {
            self.log_unsaved_charge(&selection, &request.user_id, e);
        }
        placed
    }

    /// Steps 6-10: the transaction and everything after it.
    async fn commit_order(
        &self,
        request: &PlacementRequest,
        quantities: &BTreeMap<String, i64>,
        selection: &PaymentSelection,
        coupon: &CouponApplication,
        note: Option<String>,
        charged_minor_units: Option<i64>,
    ) -> CheckoutResult<PlacementReceipt> {
        debug!(
            user_id = %request.user_id,
            products = quantities.len(),
            method = %selection.method(),
            "Starting order transaction"
        );

        let mut tx = self.db.begin().await?;

        // Dropping `tx` on any early return rolls back every debit made so far.
        for (product_id, quantity) in quantities {
            match reserve_and_debit(&mut tx, product_id, *quantity).await? {
                DebitOutcome::Debited { remaining } => {
                    debug!(product_id = %product_id, quantity, remaining, "Stock debited");
                }
                DebitOutcome::InsufficientStock { available } => {
                    info!(product_id = %product_id, requested = quantity, available, "Insufficient stock");
                    return Err(StockError::InsufficientStock {
                        product_id: product_id.clone(),
                        name: line_name(&request.line_items, product_id),
                        available,
                    }
                    .into());
                }
                DebitOutcome::NotFound => {
                    info!(product_id = %product_id, "Product no longer available");
                    return Err(StockError::ProductNotFound {
                        product_id: product_id.clone(),
                        name: line_name(&request.line_items, product_id),
                    }
                    .into());
                }
            }
        }

        let ids: Vec<&str> = quantities.keys().map(String::as_str).collect();
        let catalog = prices_in(&mut tx, &ids).await?;

        let mut lines = Vec::with_capacity(request.line_items.len());
        for item in &request.line_items {
            let entry = catalog.get(&item.product_id).ok_or_else(|| StockError::ProductNotFound {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
            })?;

            if item.unit_price_snapshot != entry.unit_price {
                warn!(
                    product_id = %item.product_id,
                    client_price = %item.unit_price_snapshot,
                    catalog_price = %entry.unit_price,
                    "Client price differs from catalog; using catalog"
                );
            }

            lines.push(OrderLine {
                product_id: item.product_id.clone(),
                name: entry.name.clone(),
                unit_price: entry.unit_price,
                quantity: item.quantity,
                line_total: entry.unit_price * item.quantity,
                size: item.size.clone(),
                color: item.color.clone(),
            });
        }

        let priced: Vec<PricedLine> = lines
            .iter()
            .map(|line| PricedLine {
                product_id: line.product_id.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect();
        let breakdown = self
            .pricing
            .quote(&priced, coupon.rate(), request.shipping_info.region());

        if let Some(client_fee) = request.shipping_fee {
            if client_fee != breakdown.shipping {
                warn!(
                    client_fee = %client_fee,
                    shipping = %breakdown.shipping,
                    region = ?request.shipping_info.region(),
                    "Client shipping fee differs; using zone table"
                );
            }
        }

        if let Some(charged) = charged_minor_units {
            let due = breakdown.amount_due_minor_units()?;
            if charged < due {
                warn!(charged, due, user_id = %request.user_id, "Charged amount does not cover order total");
                return Err(CheckoutError::PaymentGateway(
                    "Charged amount does not cover the order total".into(),
                ));
            }
        }

        let order = build_order(request, lines, &breakdown, selection, note, coupon.applied_code());

        if let Err(e) = insert_order(&mut tx, &order).await {
            if let (true, Some(reference)) = (e.is_unique_violation(), selection.reference()) {
                drop(tx);
                return self.replay(&request.user_id, reference).await;
            }
            return Err(e.into());
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            status = %order.status,
            total = %order.total,
            "Order placed"
        );

        self.notifications.dispatch(&order);

        Ok(PlacementReceipt::for_order(&order, false))
    }

    /// Returns the order already placed for `(user_id, reference)`.
    async fn replay(&self, user_id: &str, reference: &PaymentReference) -> CheckoutResult<PlacementReceipt> {
        match self.db.orders().find_by_reference(user_id, reference.as_str()).await? {
            Some(existing) => {
                info!(order_id = %existing.id, reference = %reference, "Concurrent duplicate placement; replaying");
                Ok(PlacementReceipt::for_order(&existing, true))
            }
            None => Err(CheckoutError::Persistence(format!(
                "order for reference {} could not be read back",
                reference
            ))),
        }
    }

    /// Every card order arrives already charged, so any failure once the
    /// charge is known leaves money without an order.
    fn log_unsaved_charge(&self, selection: &PaymentSelection, user_id: &str, e: &CheckoutError) {
        if let PaymentSelection::Card { reference } = selection {
            error!(
                reference = %reference,
                user_id,
                error = %e,
                "Card was charged but the order was not saved; needs manual reconciliation"
            );
        }
    }

    /// Moves a pending (transfer) order to `Confirmed` or `Failed`.
    pub async fn reconcile(&self, order_id: &str, to: OrderStatus) -> CheckoutResult<Order> {
        let orders = self.db.orders();
        let order = orders
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CheckoutError::InvalidRequest(format!("Order {} not found", order_id)))?;

        if !order.status.can_transition_to(to) {
            return Err(CoreError::InvalidStatusTransition {
                from: order.status.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        if !orders.update_status(order_id, order.status, to).await? {
            return Err(CheckoutError::InvalidRequest(format!(
                "Order {} changed status concurrently",
                order_id
            )));
        }

        info!(order_id, from = %order.status, to = %to, "Order reconciled");
        Ok(Order { status: to, ..order })
    }
}

fn line_name(lines: &[CartLine], product_id: &str) -> String {
    lines
        .iter()
        .find(|line| line.product_id == product_id)
        .map(|line| line.name.clone())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "Product".to_string())
}

fn build_order(
    request: &PlacementRequest,
    lines: Vec<OrderLine>,
    breakdown: &PriceBreakdown,
    selection: &PaymentSelection,
    note: Option<String>,
    coupon_code: Option<&str>,
) -> Order {
    Order {
        id: Uuid::new_v4().to_string(),
        user_id: request.user_id.clone(),
        lines,
        shipping_info: request.shipping_info.clone(),
        payment_method: selection.method(),
        payment_reference: selection.reference().map(|r| r.as_str().to_string()),
        subtotal: breakdown.subtotal,
        discount: breakdown.discount,
        shipping: breakdown.shipping,
        tax: breakdown.tax,
        total: breakdown.total,
        status: selection.initial_status(),
        note,
        coupon_code: coupon_code.map(str::to_string),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use storefront_core::{Coupon, Discount};
    use storefront_db::{DbConfig, NewProduct};

    const SECRET: &str = "coordinator-test";

    async fn setup() -> (Database, OrderPlacementCoordinator, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
            .upsert(&NewProduct::new("DRS-ANK", "Ankara Wrap Dress", Money::from_major(4_000), 10))
            .await
            .unwrap();
        db.catalog()
            .upsert(&NewProduct::new("SHT-LIN", "Linen Shirt", Money::from_major(1_000), 2))
            .await
            .unwrap();
        db.coupons()
            .insert(&Coupon {
                code: "WELCOME10".into(),
                discount: Discount::from_parts("percentage", Decimal::from(10)),
                is_active: true,
            })
            .await
            .unwrap();

        let authority = SessionAuthority::new(SECRET, 3600);
        let token = authority.issue("u1").unwrap();
        let coordinator = OrderPlacementCoordinator::new(
            db.clone(),
            authority,
            PricingEngine::default(),
            NotificationDispatcher::new(&db, false),
        );
        (db, coordinator, token)
    }

    fn line(id: &str, price: i64, quantity: i64) -> CartLine {
        CartLine {
            product_id: id.into(),
            name: id.into(),
            unit_price_snapshot: Money::from_major(price),
            quantity,
            size: None,
            color: None,
        }
    }

    fn request(lines: Vec<CartLine>, method: PaymentMethod, reference: Option<&str>) -> PlacementRequest {
        PlacementRequest {
            user_id: "u1".into(),
            line_items: lines,
            shipping_info: ShippingInfo {
                first_name: "Ada".into(),
                last_name: "Obi".into(),
                email: "ada@example.ng".into(),
                phone: "08031234567".into(),
                address: "12 Marina Road".into(),
                city: "Ikeja".into(),
                state: "Lagos".into(),
                zip_code: "100001".into(),
            },
            payment_method: method,
            payment_reference: reference.map(PaymentReference::new),
            shipping_fee: None,
            note: None,
            coupon_code: None,
        }
    }

    #[tokio::test]
    async fn test_transfer_order_is_pending() {
        let (db, coordinator, token) = setup().await;
        let receipt = coordinator
            .place(&token, request(vec![line("DRS-ANK", 4_000, 1)], PaymentMethod::Transfer, None))
            .await
            .unwrap();

        assert_eq!(receipt.status, OrderStatus::Pending);
        assert!(!receipt.replayed);

        let order = db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_reference, None);
        assert_eq!(db.stock().get("DRS-ANK").await.unwrap().unwrap().available_quantity, 9);
    }

    #[tokio::test]
    async fn test_coupon_and_tax_on_discounted_subtotal() {
        let (_db, coordinator, token) = setup().await;
        let mut req = request(vec![line("DRS-ANK", 4_000, 2), line("SHT-LIN", 1_000, 2)], PaymentMethod::Transfer, None);
        req.coupon_code = Some("WELCOME10".into());

        let receipt = coordinator.place(&token, req).await.unwrap();

        // 10,000 - 1,000 + 1,500 (Lagos) + 675 (7.5% of 9,000)
        assert_eq!(receipt.total, Money::from_major(11_175));
    }

    #[tokio::test]
    async fn test_card_requires_reference() {
        let (_db, coordinator, token) = setup().await;
        let result = coordinator
            .place(&token, request(vec![line("DRS-ANK", 4_000, 1)], PaymentMethod::Card, None))
            .await;
        assert!(matches!(result, Err(CheckoutError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_token_for_other_user_rejected() {
        let (db, coordinator, _) = setup().await;
        let other = SessionAuthority::new(SECRET, 3600).issue("u2").unwrap();

        let result = coordinator
            .place(&other, request(vec![line("DRS-ANK", 4_000, 1)], PaymentMethod::Transfer, None))
            .await;

        assert!(matches!(result, Err(CheckoutError::Auth(_))));
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back() {
        let (db, coordinator, token) = setup().await;
        let result = coordinator
            .place(
                &token,
                request(vec![line("DRS-ANK", 4_000, 1), line("ZZZ-GONE", 1, 1)], PaymentMethod::Transfer, None),
            )
            .await;

        match result {
            Err(CheckoutError::Stock(StockError::ProductNotFound { product_id, .. })) => {
                assert_eq!(product_id, "ZZZ-GONE");
            }
            other => panic!("expected ProductNotFound, got {:?}", other),
        }
        assert_eq!(db.stock().get("DRS-ANK").await.unwrap().unwrap().available_quantity, 10);
    }

    #[tokio::test]
    async fn test_reconcile_pending_transfer() {
        let (_db, coordinator, token) = setup().await;
        let receipt = coordinator
            .place(&token, request(vec![line("DRS-ANK", 4_000, 1)], PaymentMethod::Transfer, None))
            .await
            .unwrap();

        let order = coordinator.reconcile(&receipt.order_id, OrderStatus::Confirmed).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);

        let again = coordinator.reconcile(&receipt.order_id, OrderStatus::Failed).await;
        assert!(matches!(again, Err(CheckoutError::InvalidRequest(_))));
    }
}
