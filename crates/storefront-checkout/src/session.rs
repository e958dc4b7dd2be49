//! # Checkout Session
//!
//! The shopper-facing checkout flow as an explicit state machine.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Loading ──load()──► Ready ◄─────────────────────────────┐              │
//! │                        │                                 │              │
//! │                    submit()                              │              │
//! │                        ▼                                 │              │
//! │                   Validating ── form / auth / stock ─────┤              │
//! │                        │                                 │              │
//! │            card ┌──────┴──────┐ transfer                 │              │
//! │                 ▼             │                          │              │
//! │         AwaitingPayment ──────┼── close ─────────────────┤              │
//! │                 │ success     │                          │              │
//! │                 ▼             ▼                          │              │
//! │                     Placing ──── error ──► Failed ───────┘              │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                    Completed                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only one submission can be in flight per [`ProcessingFlag`]. A flag can be
//! shared between sessions (several tabs) to hold them all back.
//!
//! The advisory stock check in `Validating` only fails fast with a friendly
//! message. The coordinator's debit is what decides.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use storefront_core::cart::group_quantities;
use storefront_core::validation::{validate_checkout_form, validate_order_note};
use storefront_core::{
    CartLine, CoreError, CouponApplication, FormField, Money, PaymentMethod, PaymentReference,
    PaymentSelection, PriceBreakdown, PricingEngine, ShippingInfo,
};

use crate::backend::CheckoutBackend;
use crate::coordinator::{PlacementReceipt, PlacementRequest};
use crate::error::{CheckoutError, CheckoutResult, StockError};
use crate::payment::PaymentGatewayAdapter;

pub const MSG_COUPON_APPLIED: &str = "Coupon applied successfully!";
pub const MSG_COUPON_REMOVED: &str = "Coupon removed";
pub const MSG_ORDER_PLACED: &str = "Order placed successfully!";
pub const MSG_STOCK_CHECK_FAILED: &str = "Could not validate stock. Please try again.";

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Loading,
    Ready,
    Validating,
    AwaitingPayment,
    Placing,
    Completed,
    Failed,
}

impl CheckoutState {
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        matches!(
            (self, next),
            (Loading, Ready)
                | (Ready, Validating)
                | (Validating, Ready)
                | (Validating, AwaitingPayment)
                | (Validating, Placing)
                | (AwaitingPayment, Placing)
                | (AwaitingPayment, Ready)
                | (AwaitingPayment, Failed)
                | (Placing, Completed)
                | (Placing, Failed)
                | (Failed, Ready)
        )
    }

    /// States during which a submission is in flight.
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            CheckoutState::Validating | CheckoutState::AwaitingPayment | CheckoutState::Placing
        )
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutState::Loading => "loading",
            CheckoutState::Ready => "ready",
            CheckoutState::Validating => "validating",
            CheckoutState::AwaitingPayment => "awaiting payment",
            CheckoutState::Placing => "placing",
            CheckoutState::Completed => "completed",
            CheckoutState::Failed => "failed",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Processing Flag
// =============================================================================

/// Single in-flight guard for submissions.
#[derive(Debug, Clone, Default)]
pub struct ProcessingFlag(Arc<AtomicBool>);

impl ProcessingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processing(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Takes the flag, or `None` when a submission is already running.
    pub fn try_acquire(&self) -> Option<ProcessingGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProcessingGuard(Arc::clone(&self.0)))
    }
}

/// Releases the flag on drop.
#[derive(Debug)]
pub struct ProcessingGuard(Arc<AtomicBool>);

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Notices
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// The last message shown to the shopper (a toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

// =============================================================================
// Session
// =============================================================================

pub struct CheckoutSession {
    backend: Arc<dyn CheckoutBackend>,
    payments: PaymentGatewayAdapter,
    pricing: PricingEngine,
    processing: ProcessingFlag,

    user_id: String,
    session_token: String,

    state: CheckoutState,
    history: Vec<(CheckoutState, CheckoutState)>,

    cart: Vec<CartLine>,
    shipping_info: ShippingInfo,
    payment_method: PaymentMethod,
    payment_reference: PaymentReference,
    coupon: CouponApplication,
    terms_accepted: bool,
    save_info: bool,
    note: Option<String>,

    field_errors: BTreeSet<FormField>,
    notice: Option<Notice>,
    receipt: Option<PlacementReceipt>,
}

impl CheckoutSession {
    pub fn new(
        backend: Arc<dyn CheckoutBackend>,
        payments: PaymentGatewayAdapter,
        pricing: PricingEngine,
        user_id: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        CheckoutSession {
            backend,
            payments,
            pricing,
            processing: ProcessingFlag::new(),
            user_id: user_id.into(),
            session_token: session_token.into(),
            state: CheckoutState::Loading,
            history: Vec::new(),
            cart: Vec::new(),
            shipping_info: ShippingInfo::default(),
            payment_method: PaymentMethod::Card,
            payment_reference: PaymentReference::generate(),
            coupon: CouponApplication::NotApplied(storefront_core::CouponRejection::NotFound),
            terms_accepted: false,
            save_info: false,
            note: None,
            field_errors: BTreeSet::new(),
            notice: None,
            receipt: None,
        }
    }

    /// Shares an existing processing flag.
    pub fn with_processing_flag(mut self, flag: ProcessingFlag) -> Self {
        self.processing = flag;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// Every transition taken, oldest first.
    pub fn history(&self) -> &[(CheckoutState, CheckoutState)] {
        &self.history
    }

    pub fn cart(&self) -> &[CartLine] {
        &self.cart
    }

    pub fn shipping_info(&self) -> &ShippingInfo {
        &self.shipping_info
    }

    pub fn coupon(&self) -> &CouponApplication {
        &self.coupon
    }

    pub fn payment_reference(&self) -> &PaymentReference {
        &self.payment_reference
    }

    pub fn field_errors(&self) -> &BTreeSet<FormField> {
        &self.field_errors
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn receipt(&self) -> Option<&PlacementReceipt> {
        self.receipt.as_ref()
    }

    pub fn save_info(&self) -> bool {
        self.save_info
    }

    pub fn processing_flag(&self) -> &ProcessingFlag {
        &self.processing
    }

    /// Display-only totals from the cart's price snapshots.
    pub fn estimate(&self) -> PriceBreakdown {
        self.pricing
            .estimate(&self.cart, self.coupon.rate(), self.shipping_info.region())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads cart and saved shipping info, then applies a link coupon
    /// (`?code=`) silently.
    ///
    /// Fails with `EmptyCart` and stays in `Loading` when there is nothing to
    /// check out.
    pub async fn load(&mut self, link_coupon: Option<&str>) -> CheckoutResult<()> {
        self.require(CheckoutState::Loading, "load")?;

        let cart = self.backend.load_cart(&self.user_id).await?;
        if cart.is_empty() {
            self.notify(NoticeLevel::Error, "No items in cart");
            return Err(CheckoutError::EmptyCart);
        }
        self.cart = cart;

        match self.backend.load_shipping_profile(&self.user_id).await {
            Ok(Some(profile)) => {
                self.shipping_info = profile;
                self.save_info = true;
            }
            Ok(None) => {}
            Err(e) => warn!(user_id = %self.user_id, error = %e, "Could not load saved shipping info"),
        }

        if let Some(code) = link_coupon.filter(|c| !c.trim().is_empty()) {
            match self.backend.lookup_coupon(code).await {
                Ok(application) if application.is_applied() => self.coupon = application,
                Ok(_) => debug!(code, "Link coupon not applied"),
                Err(e) => warn!(code, error = %e, "Link coupon lookup failed"),
            }
        }

        info!(user_id = %self.user_id, lines = self.cart.len(), "Checkout loaded");
        self.transition(CheckoutState::Ready)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Sets a form field and clears its error flag.
    pub fn set_field(&mut self, field: FormField, value: impl Into<String>) {
        *field.value_mut(&mut self.shipping_info) = value.into();
        self.field_errors.remove(&field);
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    pub fn set_terms_accepted(&mut self, accepted: bool) {
        self.terms_accepted = accepted;
    }

    pub fn set_save_info(&mut self, save: bool) {
        self.save_info = save;
    }

    pub fn set_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        self.note = if note.trim().is_empty() { None } else { Some(note) };
    }

    /// Applies a manually entered coupon.
    ///
    /// A rejected code leaves any previously applied coupon in place and
    /// returns `CouponInvalid`; checkout can still proceed.
    pub async fn apply_coupon(&mut self, code: &str) -> CheckoutResult<CouponApplication> {
        self.require(CheckoutState::Ready, "apply a coupon")?;
        if code.trim().is_empty() {
            return Ok(self.coupon.clone());
        }

        let application = self.backend.lookup_coupon(code).await?;
        match &application {
            CouponApplication::Applied { .. } => {
                self.coupon = application.clone();
                self.notify(NoticeLevel::Success, MSG_COUPON_APPLIED);
                Ok(application)
            }
            CouponApplication::NotApplied(reason) => {
                self.notify(NoticeLevel::Error, reason.to_string());
                Err(CheckoutError::CouponInvalid(reason.clone()))
            }
        }
    }

    pub fn remove_coupon(&mut self) {
        self.coupon = CouponApplication::NotApplied(storefront_core::CouponRejection::NotFound);
        self.notify(NoticeLevel::Success, MSG_COUPON_REMOVED);
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Runs one checkout attempt to completion.
    ///
    /// ## Outcomes
    /// - form, auth or advisory stock failure: back to `Ready`, nothing sent
    /// - card widget closed: back to `Ready` with a fresh payment reference
    /// - gateway or coordinator failure: `Failed` then `Ready`, cart intact
    /// - success: cart cleared, `Completed`
    pub async fn submit(&mut self) -> CheckoutResult<PlacementReceipt> {
        let Some(_guard) = self.processing.try_acquire() else {
            return Err(CheckoutError::Busy);
        };
        self.require(CheckoutState::Ready, "submit")?;
        self.transition(CheckoutState::Validating)?;

        if let Err(e) = self.validate().await {
            self.transition(CheckoutState::Ready)?;
            return Err(e);
        }

        let selection = match self.payment_method {
            PaymentMethod::Transfer => PaymentSelection::Transfer,
            PaymentMethod::Card => {
                self.transition(CheckoutState::AwaitingPayment)?;
                let amount = self.estimate().total;
                match self.collect_card(amount).await {
                    Ok(selection) => selection,
                    Err(CheckoutError::PaymentCancelled) => {
                        self.notify(NoticeLevel::Error, "Payment cancelled");
                        self.payment_reference = PaymentReference::generate();
                        self.transition(CheckoutState::Ready)?;
                        return Err(CheckoutError::PaymentCancelled);
                    }
                    Err(e) => return self.fail(e),
                }
            }
        };

        self.transition(CheckoutState::Placing)?;

        if self.save_info {
            if let Err(e) = self
                .backend
                .save_shipping_profile(&self.user_id, &self.shipping_info)
                .await
            {
                warn!(user_id = %self.user_id, error = %e, "Could not save shipping info");
            }
        }

        let request = self.placement_request(&selection);
        match self.backend.place_order(&self.session_token, request).await {
            Ok(receipt) => {
                if let Err(e) = self.backend.clear_cart(&self.user_id).await {
                    warn!(user_id = %self.user_id, error = %e, "Order placed but cart was not cleared");
                }
                self.cart.clear();
                self.receipt = Some(receipt.clone());
                self.notify(NoticeLevel::Success, MSG_ORDER_PLACED);
                info!(order_id = %receipt.order_id, total = %receipt.total, "Checkout completed");
                self.transition(CheckoutState::Completed)?;
                Ok(receipt)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Form, auth and advisory stock checks, in that order.
    async fn validate(&mut self) -> CheckoutResult<()> {
        if let Err(errors) = validate_checkout_form(&self.shipping_info, self.terms_accepted) {
            self.field_errors = errors.fields.clone();
            self.notify(NoticeLevel::Error, errors.message.clone());
            return Err(errors.into());
        }
        self.field_errors.clear();

        if let Err(e) = validate_order_note(self.note.as_deref()) {
            let e = CheckoutError::from(CoreError::from(e));
            self.notify(NoticeLevel::Error, e.user_message());
            return Err(e);
        }

        if self.cart.is_empty() {
            self.notify(NoticeLevel::Error, "No items in cart");
            return Err(CheckoutError::EmptyCart);
        }

        if let Err(e) = self
            .backend
            .verify_session(&self.session_token, &self.user_id)
            .await
        {
            self.notify(NoticeLevel::Error, e.user_message());
            return Err(e);
        }

        if let Err(e) = self.advisory_stock_check().await {
            let message = match &e {
                CheckoutError::Stock(_) => e.user_message(),
                _ => MSG_STOCK_CHECK_FAILED.to_string(),
            };
            self.notify(NoticeLevel::Error, message);
            return Err(e);
        }

        Ok(())
    }

    /// Non-binding stock read; holds no reservation.
    async fn advisory_stock_check(&self) -> CheckoutResult<()> {
        let quantities = group_quantities(&self.cart);
        let ids: Vec<String> = quantities.keys().cloned().collect();
        let stock = self.backend.read_stock(&ids).await?;
        check_quantities(&quantities, &stock, &self.cart)
    }

    async fn collect_card(&self, amount: Money) -> CheckoutResult<PaymentSelection> {
        self.payments
            .collect(
                PaymentMethod::Card,
                &self.payment_reference,
                &self.shipping_info.email,
                amount,
            )
            .await
    }

    fn placement_request(&self, selection: &PaymentSelection) -> PlacementRequest {
        PlacementRequest {
            user_id: self.user_id.clone(),
            line_items: self.cart.clone(),
            shipping_info: self.shipping_info.clone(),
            payment_method: selection.method(),
            payment_reference: selection.reference().cloned(),
            shipping_fee: Some(self.estimate().shipping),
            note: self.note.clone(),
            coupon_code: self.coupon.applied_code().map(str::to_string),
        }
    }

    /// `Failed` then `Ready`, with a fresh reference for the next attempt.
    fn fail(&mut self, e: CheckoutError) -> CheckoutResult<PlacementReceipt> {
        warn!(user_id = %self.user_id, state = %self.state, error = %e, "Checkout attempt failed");
        self.notify(NoticeLevel::Error, e.user_message());
        self.transition(CheckoutState::Failed)?;
        self.payment_reference = PaymentReference::generate();
        self.transition(CheckoutState::Ready)?;
        Err(e)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require(&self, expected: CheckoutState, action: &'static str) -> CheckoutResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CheckoutError::InvalidState {
                action,
                state: self.state.to_string(),
            })
        }
    }

    fn transition(&mut self, next: CheckoutState) -> CheckoutResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CheckoutError::InvalidState {
                action: "change state",
                state: self.state.to_string(),
            });
        }
        debug!(from = %self.state, to = %next, "Checkout transition");
        self.history.push((self.state, next));
        self.state = next;
        Ok(())
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notice = Some(Notice {
            level,
            message: message.into(),
        });
    }
}

/// Compares grouped cart quantities with a stock read.
fn check_quantities(
    quantities: &std::collections::BTreeMap<String, i64>,
    stock: &HashMap<String, storefront_core::StockRecord>,
    cart: &[CartLine],
) -> CheckoutResult<()> {
    for (product_id, requested) in quantities {
        let Some(record) = stock.get(product_id) else {
            let name = cart
                .iter()
                .find(|line| &line.product_id == product_id)
                .map(|line| line.name.clone())
                .unwrap_or_else(|| "Product".to_string());
            return Err(StockError::ProductNotFound {
                product_id: product_id.clone(),
                name,
            }
            .into());
        };

        if record.available_quantity < *requested {
            return Err(StockError::InsufficientStock {
                product_id: product_id.clone(),
                name: record.name.clone(),
                available: record.available_quantity,
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::StockRecord;

    #[test]
    fn test_processing_flag_single_holder() {
        let flag = ProcessingFlag::new();
        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_processing());
        assert!(flag.clone().try_acquire().is_none());

        drop(guard);
        assert!(!flag.is_processing());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn test_transition_table() {
        use CheckoutState::*;
        assert!(Loading.can_transition_to(Ready));
        assert!(Validating.can_transition_to(Placing));
        assert!(AwaitingPayment.can_transition_to(Ready));
        assert!(Failed.can_transition_to(Ready));

        assert!(!Ready.can_transition_to(Placing));
        assert!(!Loading.can_transition_to(Validating));
        assert!(!Completed.can_transition_to(Ready));
        assert!(Placing.is_processing());
        assert!(!Ready.is_processing());
    }

    #[test]
    fn test_check_quantities_groups_variants() {
        let line = |size: &str, quantity| CartLine {
            product_id: "p1".into(),
            name: "Kaftan".into(),
            unit_price_snapshot: Money::from_major(100),
            quantity,
            size: Some(size.into()),
            color: None,
        };
        let cart = vec![line("M", 2), line("L", 2)];
        let quantities = group_quantities(&cart);

        let mut stock = HashMap::new();
        stock.insert(
            "p1".to_string(),
            StockRecord {
                product_id: "p1".into(),
                available_quantity: 3,
                name: "Adire Kaftan".into(),
            },
        );

        match check_quantities(&quantities, &stock, &cart) {
            Err(CheckoutError::Stock(StockError::InsufficientStock { available, name, .. })) => {
                assert_eq!(available, 3);
                assert_eq!(name, "Adire Kaftan");
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }

        stock.clear();
        assert!(matches!(
            check_quantities(&quantities, &stock, &cart),
            Err(CheckoutError::Stock(StockError::ProductNotFound { .. }))
        ));
    }
}
