//! # Order Notifications
//!
//! Fire-and-forget order confirmations. A committed order is already durable
//! when its notification is queued; nothing in this module can undo it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Notification Flow                                    │
//! │                                                                         │
//! │  coordinator commit                                                     │
//! │       │                                                                 │
//! │       ▼  dispatch() spawns, never awaited                               │
//! │  notification_outbox  (kind = "order_confirmation")                     │
//! │       │                                                                 │
//! │       ▼  run() polls on an interval                                     │
//! │  drain(): pending ──► NotificationSender::send ──► mark_sent            │
//! │                                      └── error ──► mark_failed          │
//! │                                                                         │
//! │  • Batch size: 50 entries                                               │
//! │  • Max attempts: 5 (then logged and left out of later batches)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use storefront_core::{Money, Order};
use storefront_db::{Database, NotificationOutboxRepository};

use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Constants
// =============================================================================

pub const ORDER_CONFIRMATION: &str = "order_confirmation";

/// Entries with this many failed attempts are left alone.
const MAX_SEND_ATTEMPTS: i64 = 5;

const DRAIN_BATCH_SIZE: u32 = 50;

// =============================================================================
// Payload
// =============================================================================

/// Order confirmation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    #[serde(rename = "type")]
    pub kind: String,
    pub email: String,
    pub order_id: String,
    pub amount: Money,
    pub customer_name: String,
}

impl OrderConfirmation {
    pub fn for_order(order: &Order) -> Self {
        OrderConfirmation {
            kind: ORDER_CONFIRMATION.to_string(),
            email: order.shipping_info.email.trim().to_string(),
            order_id: order.id.clone(),
            amount: order.total,
            customer_name: order.shipping_info.customer_name(),
        }
    }
}

/// Delivers a notification (email, SMS, webhook ...).
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &OrderConfirmation) -> CheckoutResult<()>;
}

/// Sender that only logs. Used when no delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, notification: &OrderConfirmation) -> CheckoutResult<()> {
        info!(
            order_id = %notification.order_id,
            email = %notification.email,
            amount = %notification.amount,
            "Order confirmation"
        );
        Ok(())
    }
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub failed: usize,
}

// =============================================================================
// Dispatcher
// =============================================================================

#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    outbox: NotificationOutboxRepository,
    enabled: bool,
}

impl NotificationDispatcher {
    pub fn new(db: &Database, enabled: bool) -> Self {
        NotificationDispatcher {
            outbox: db.notification_outbox(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Queues a confirmation for `order` on a background task.
    ///
    /// Returns the task handle (tests await it); callers normally drop it.
    pub fn dispatch(&self, order: &Order) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }

        let this = self.clone();
        let notification = OrderConfirmation::for_order(order);

        Some(tokio::spawn(async move {
            if let Err(e) = this.enqueue(&notification).await {
                warn!(order_id = %notification.order_id, error = %e, "Failed to queue order confirmation");
            }
        }))
    }

    /// Writes a notification to the outbox.
    pub async fn enqueue(&self, notification: &OrderConfirmation) -> CheckoutResult<()> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| CheckoutError::Persistence(format!("notification payload: {}", e)))?;

        self.outbox
            .enqueue(&notification.kind, &notification.order_id, &payload)
            .await?;

        debug!(order_id = %notification.order_id, "Order confirmation queued");
        Ok(())
    }

    /// Sends up to one batch of pending notifications.
    pub async fn drain(&self, sender: &dyn NotificationSender) -> CheckoutResult<DrainReport> {
        let mut report = DrainReport::default();

        for entry in self.outbox.pending(DRAIN_BATCH_SIZE, MAX_SEND_ATTEMPTS).await? {
            let notification: OrderConfirmation = match serde_json::from_str(&entry.payload) {
                Ok(n) => n,
                Err(e) => {
                    error!(id = %entry.id, error = %e, "Unreadable notification payload");
                    self.outbox.mark_failed(&entry.id, &e.to_string()).await?;
                    report.failed += 1;
                    continue;
                }
            };

            match sender.send(&notification).await {
                Ok(()) => {
                    self.outbox.mark_sent(&entry.id).await?;
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(id = %entry.id, order_id = %entry.order_id, error = %e, "Notification send failed");
                    self.outbox.mark_failed(&entry.id, &e.to_string()).await?;
                    report.failed += 1;
                    if entry.attempts + 1 >= MAX_SEND_ATTEMPTS {
                        error!(id = %entry.id, order_id = %entry.order_id, "Giving up on notification");
                    }
                }
            }
        }

        if report.sent + report.failed > 0 {
            debug!(?report, "Notification drain complete");
        }
        Ok(report)
    }

    /// Drains on an interval until `shutdown` receives.
    ///
    /// This should be spawned as a background task.
    pub async fn run(
        self,
        sender: Arc<dyn NotificationSender>,
        poll_interval: Duration,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        info!("Notification drain starting");

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.drain(sender.as_ref()).await {
                        error!(error = %e, "Notification drain failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Notification drain shutting down");
                    break;
                }
            }
        }
    }
}
