//! # Payment Gateway Adapter
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Payment Methods                                 │
//! │                                                                         │
//! │  CARD                                                                   │
//! │  ────                                                                   │
//! │  fresh PaymentReference ──► GatewayWidgetConfig                         │
//! │     {reference, email, amount (kobo, rounded up), publicKey}            │
//! │       │                                                                 │
//! │       ▼  PaymentGateway::open  (bounded by gateway_timeout)             │
//! │  ┌──────────────┬───────────────────┬──────────────────────┐            │
//! │  │ Success{ref} │ Close             │ no answer            │            │
//! │  │ → Card{ref}  │ → PaymentCancelled│ → PaymentTimeout     │            │
//! │  └──────────────┴───────────────────┴──────────────────────┘            │
//! │                                                                         │
//! │  TRANSFER                                                               │
//! │  ────────                                                               │
//! │  no gateway step ──► Transfer (order is created Pending)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The widget runs in the shopper's browser. [`WidgetBridge`] hands each
//! charge to whatever hosts that widget over a channel and waits on a
//! one-shot responder for the single callback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use storefront_core::{
    Money, PaymentAttempt, PaymentMethod, PaymentOutcome, PaymentReference, PaymentSelection,
};

use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Widget Protocol
// =============================================================================

/// Configuration handed to the gateway's payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayWidgetConfig {
    pub reference: PaymentReference,
    pub email: String,
    /// Amount in kobo, rounded up.
    pub amount_minor_units: i64,
    pub public_key: String,
}

/// The single callback a widget session resolves with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayCallback {
    Success { reference: PaymentReference },
    Close,
}

/// Something that can run a payment widget to completion.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens the widget and resolves with its callback.
    async fn open(&self, config: GatewayWidgetConfig) -> CheckoutResult<GatewayCallback>;
}

/// Server-side check of a card reference against the gateway.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// Returns the amount actually charged for `reference`, in kobo.
    ///
    /// Errors with `PaymentGateway` when the gateway does not know the
    /// reference or the charge did not succeed.
    async fn verify(&self, reference: &PaymentReference) -> CheckoutResult<i64>;
}

// =============================================================================
// Widget Bridge
// =============================================================================

/// A pending widget session, delivered to the widget host.
#[derive(Debug)]
pub struct WidgetRequest {
    pub config: GatewayWidgetConfig,
    responder: oneshot::Sender<GatewayCallback>,
}

impl WidgetRequest {
    /// Resolves the session. Only the first callback counts; the request is
    /// consumed.
    pub fn respond(self, callback: GatewayCallback) {
        if self.responder.send(callback).is_err() {
            debug!(reference = %self.config.reference, "Checkout stopped waiting before the widget answered");
        }
    }

    /// `onSuccess` with the configured reference.
    pub fn succeed(self) {
        let reference = self.config.reference.clone();
        self.respond(GatewayCallback::Success { reference });
    }

    /// `onClose`.
    pub fn close(self) {
        self.respond(GatewayCallback::Close);
    }
}

/// [`PaymentGateway`] over a channel to the widget host.
#[derive(Debug, Clone)]
pub struct WidgetBridge {
    requests: mpsc::Sender<WidgetRequest>,
}

impl WidgetBridge {
    /// Creates a bridge and the receiver the widget host drains.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<WidgetRequest>) {
        let (requests, rx) = mpsc::channel(buffer);
        (WidgetBridge { requests }, rx)
    }
}

#[async_trait]
impl PaymentGateway for WidgetBridge {
    async fn open(&self, config: GatewayWidgetConfig) -> CheckoutResult<GatewayCallback> {
        let (responder, callback) = oneshot::channel();

        self.requests
            .send(WidgetRequest { config, responder })
            .await
            .map_err(|_| CheckoutError::PaymentGateway("Payment widget is not available".into()))?;

        callback
            .await
            .map_err(|_| CheckoutError::PaymentGateway("Payment widget closed without a result".into()))
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Branches card and transfer payments and bounds the card wait.
#[derive(Clone)]
pub struct PaymentGatewayAdapter {
    gateway: Arc<dyn PaymentGateway>,
    public_key: String,
    timeout: Duration,
}

impl PaymentGatewayAdapter {
    pub fn new(gateway: Arc<dyn PaymentGateway>, public_key: impl Into<String>, timeout: Duration) -> Self {
        PaymentGatewayAdapter {
            gateway,
            public_key: public_key.into(),
            timeout,
        }
    }

    /// Builds the widget configuration; the amount is converted to kobo and
    /// rounded up so the shopper is never undercharged.
    pub fn widget_config(
        &self,
        reference: &PaymentReference,
        email: &str,
        amount: Money,
    ) -> CheckoutResult<GatewayWidgetConfig> {
        Ok(GatewayWidgetConfig {
            reference: reference.clone(),
            email: email.trim().to_string(),
            amount_minor_units: amount.to_minor_units_ceil()?,
            public_key: self.public_key.clone(),
        })
    }

    /// Runs one card charge through the widget.
    ///
    /// `Close` is reported as a `Cancelled` attempt, not an error.
    pub async fn charge_card(
        &self,
        reference: &PaymentReference,
        email: &str,
        amount: Money,
    ) -> CheckoutResult<PaymentAttempt> {
        let config = self.widget_config(reference, email, amount)?;
        info!(
            reference = %reference,
            amount_minor_units = config.amount_minor_units,
            "Opening payment widget"
        );

        let callback = tokio::time::timeout(self.timeout, self.gateway.open(config))
            .await
            .map_err(|_| {
                warn!(reference = %reference, "Payment widget timed out");
                CheckoutError::PaymentTimeout {
                    secs: self.timeout.as_secs(),
                }
            })??;

        let outcome = match callback {
            GatewayCallback::Success { reference: returned } if &returned == reference => PaymentOutcome::Success,
            GatewayCallback::Success { reference: returned } => {
                warn!(expected = %reference, returned = %returned, "Gateway returned a different reference");
                return Err(CheckoutError::PaymentGateway(
                    "Payment reference does not match this checkout".into(),
                ));
            }
            GatewayCallback::Close => PaymentOutcome::Cancelled,
        };

        debug!(reference = %reference, ?outcome, "Payment widget resolved");
        Ok(PaymentAttempt {
            reference: reference.clone(),
            method: PaymentMethod::Card,
            outcome,
        })
    }

    /// Collects payment for `method`.
    ///
    /// Transfer never touches the gateway. Card resolves to
    /// `PaymentSelection::Card` on success and `PaymentCancelled` on close.
    pub async fn collect(
        &self,
        method: PaymentMethod,
        reference: &PaymentReference,
        email: &str,
        amount: Money,
    ) -> CheckoutResult<PaymentSelection> {
        match method {
            PaymentMethod::Transfer => Ok(PaymentSelection::Transfer),
            PaymentMethod::Card => {
                let attempt = self.charge_card(reference, email, amount).await?;
                match attempt.outcome {
                    PaymentOutcome::Success => Ok(PaymentSelection::Card {
                        reference: attempt.reference,
                    }),
                    PaymentOutcome::Cancelled => Err(CheckoutError::PaymentCancelled),
                    PaymentOutcome::Failed => Err(CheckoutError::PaymentGateway("Card payment failed".into())),
                }
            }
        }
    }
}
