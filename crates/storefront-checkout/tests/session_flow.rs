//! Checkout sessions driven end to end over a `LocalBackend`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use common::{line, shipping_info, Fixture, USER};
use storefront_checkout::session::{MSG_COUPON_APPLIED, MSG_ORDER_PLACED};
use storefront_checkout::{
    CheckoutBackend, CheckoutError, CheckoutSession, CheckoutState, NoticeLevel, PaymentGatewayAdapter,
    ProcessingFlag, WidgetBridge, WidgetRequest,
};
use storefront_core::{CouponApplication, FormField, Money, OrderStatus, PaymentMethod, PaymentReference};

use CheckoutState::*;

fn session(fx: &Fixture, bridge: WidgetBridge) -> CheckoutSession {
    let backend: Arc<dyn CheckoutBackend> = fx.backend.clone();
    let payments = PaymentGatewayAdapter::new(Arc::new(bridge), "pk_test_storefront", Duration::from_secs(5));
    CheckoutSession::new(backend, payments, fx.config.pricing_engine(), USER, fx.token(USER))
}

/// A session over a cart holding one dress, with a complete form.
async fn ready_session(fx: &Fixture, bridge: WidgetBridge) -> CheckoutSession {
    fx.add_to_cart(USER, line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)).await;

    let mut session = session(fx, bridge);
    session.load(None).await.unwrap();

    let info = shipping_info();
    for field in FormField::REQUIRED {
        session.set_field(field, field.value(&info));
    }
    session.set_terms_accepted(true);
    session
}

/// Answers every widget session with `answer`, recording what it was shown.
fn widget_host(
    mut rx: mpsc::Receiver<WidgetRequest>,
    answer: fn(WidgetRequest),
) -> (JoinHandle<()>, Arc<std::sync::Mutex<Vec<PaymentReference>>>) {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let handle = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            record.lock().unwrap().push(request.config.reference.clone());
            answer(request);
        }
    });
    (handle, seen)
}

#[tokio::test]
async fn test_transfer_checkout_completes() {
    let fx = Fixture::memory().await;
    let (bridge, _rx) = WidgetBridge::new(1);
    let mut session = ready_session(&fx, bridge).await;
    session.set_payment_method(PaymentMethod::Transfer);

    let receipt = session.submit().await.unwrap();

    assert_eq!(receipt.status, OrderStatus::Pending);
    assert_eq!(receipt.total, Money::from_major(5_800));
    assert_eq!(session.state(), Completed);
    assert_eq!(
        session.history(),
        &[(Loading, Ready), (Ready, Validating), (Validating, Placing), (Placing, Completed)]
    );
    assert_eq!(session.notice().unwrap().message, MSG_ORDER_PLACED);
    assert!(session.cart().is_empty());
    assert!(fx.db.carts().lines(USER).await.unwrap().is_empty());
    assert_eq!(fx.stock_of("DRS-ANK").await, 9);
}

#[tokio::test]
async fn test_card_checkout_uses_session_reference() {
    let fx = Fixture::memory().await;
    let (bridge, rx) = WidgetBridge::new(1);
    let (_host, seen) = widget_host(rx, WidgetRequest::succeed);
    let mut session = ready_session(&fx, bridge).await;
    let reference = session.payment_reference().clone();

    let receipt = session.submit().await.unwrap();

    assert_eq!(receipt.status, OrderStatus::Confirmed);
    assert_eq!(session.state(), Completed);
    assert_eq!(
        session.history(),
        &[
            (Loading, Ready),
            (Ready, Validating),
            (Validating, AwaitingPayment),
            (AwaitingPayment, Placing),
            (Placing, Completed),
        ]
    );
    assert_eq!(seen.lock().unwrap().as_slice(), &[reference.clone()]);

    let order = fx.db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_reference.as_deref(), Some(reference.as_str()));
}

#[tokio::test]
async fn test_closing_widget_returns_to_ready() {
    let fx = Fixture::memory().await;
    let (bridge, rx) = WidgetBridge::new(1);
    let (_host, _seen) = widget_host(rx, WidgetRequest::close);
    let mut session = ready_session(&fx, bridge).await;
    let first_reference = session.payment_reference().clone();

    let err = session.submit().await.unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentCancelled));
    assert_eq!(session.state(), Ready);
    assert_ne!(session.payment_reference(), &first_reference);
    assert_eq!(session.cart().len(), 1);
    assert_eq!(fx.stock_of("DRS-ANK").await, 10);
    assert_eq!(fx.db.orders().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_form_errors_flag_fields() {
    let fx = Fixture::memory().await;
    let (bridge, _rx) = WidgetBridge::new(1);
    let mut session = ready_session(&fx, bridge).await;
    session.set_field(FormField::City, "");
    session.set_field(FormField::ZipCode, " ");

    let err = session.submit().await.unwrap_err();

    assert!(matches!(err, CheckoutError::Validation(_)));
    assert_eq!(session.state(), Ready);
    assert!(session.field_errors().contains(&FormField::City));
    assert!(session.field_errors().contains(&FormField::ZipCode));
    assert_eq!(session.notice().unwrap().level, NoticeLevel::Error);

    session.set_field(FormField::City, "Ikeja");
    assert!(!session.field_errors().contains(&FormField::City));
    assert!(session.field_errors().contains(&FormField::ZipCode));
}

#[tokio::test]
async fn test_advisory_stock_check_stops_submission() {
    let fx = Fixture::memory().await;
    fx.add_to_cart(USER, line("SHT-LIN", "Linen Shirt", 1_000, 3)).await;
    let (bridge, rx) = WidgetBridge::new(1);
    let (_host, seen) = widget_host(rx, WidgetRequest::succeed);
    let mut session = ready_session(&fx, bridge).await;

    let err = session.submit().await.unwrap_err();

    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    assert_eq!(
        session.notice().unwrap().message,
        "Sorry, Linen Shirt is out of stock (Only 2 left)."
    );
    assert_eq!(session.state(), Ready);
    // the gateway was never opened
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_shared_processing_flag_rejects_second_submit() {
    let fx = Fixture::memory().await;
    let (bridge, _rx) = WidgetBridge::new(1);
    let flag = ProcessingFlag::new();
    let mut session = ready_session(&fx, bridge).await.with_processing_flag(flag.clone());
    session.set_payment_method(PaymentMethod::Transfer);

    let held = flag.try_acquire().unwrap();
    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Busy));
    assert_eq!(session.state(), Ready);

    drop(held);
    session.submit().await.unwrap();
    assert!(!flag.is_processing());
}

#[tokio::test]
async fn test_placement_failure_goes_through_failed() {
    let fx = Fixture::memory().await;
    let (bridge, mut rx) = WidgetBridge::new(1);
    let mut session = ready_session(&fx, bridge).await;
    let first_reference = session.payment_reference().clone();

    // someone else buys the last dresses while the widget is open
    let db = fx.db.clone();
    let host = tokio::spawn(async move {
        let request = rx.recv().await.unwrap();
        db.catalog()
            .upsert(&storefront_db::NewProduct::new(
                "DRS-ANK",
                "Ankara Wrap Dress",
                Money::from_major(4_000),
                0,
            ))
            .await
            .unwrap();
        request.succeed();
    });

    let err = session.submit().await.unwrap_err();
    host.await.unwrap();

    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    assert_eq!(
        session.history()[3..],
        [(AwaitingPayment, Placing), (Placing, Failed), (Failed, Ready)]
    );
    assert_eq!(session.state(), Ready);
    assert_ne!(session.payment_reference(), &first_reference);
    assert_eq!(session.cart().len(), 1);
    assert_eq!(fx.db.orders().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_link_coupon_applies_silently() {
    let fx = Fixture::memory().await;
    fx.add_to_cart(USER, line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)).await;
    let (bridge, _rx) = WidgetBridge::new(1);
    let mut session = session(&fx, bridge);

    session.load(Some("WELCOME10")).await.unwrap();

    assert!(session.coupon().is_applied());
    assert!(session.notice().is_none());
    assert_eq!(session.estimate().total, Money::from_major(5_370));
}

#[tokio::test]
async fn test_rejected_coupon_keeps_previous_one() {
    let fx = Fixture::memory().await;
    let (bridge, _rx) = WidgetBridge::new(1);
    let mut session = ready_session(&fx, bridge).await;

    let applied = session.apply_coupon("WELCOME10").await.unwrap();
    assert!(matches!(applied, CouponApplication::Applied { .. }));
    assert_eq!(session.notice().unwrap().message, MSG_COUPON_APPLIED);

    let err = session.apply_coupon("NOPE").await.unwrap_err();
    assert!(matches!(err, CheckoutError::CouponInvalid(_)));
    assert!(err.is_benign());
    assert_eq!(session.coupon().applied_code(), Some("WELCOME10"));

    session.set_payment_method(PaymentMethod::Transfer);
    let receipt = session.submit().await.unwrap();
    assert_eq!(receipt.total, Money::from_major(5_370));
}

#[tokio::test]
async fn test_empty_cart_stays_loading() {
    let fx = Fixture::memory().await;
    let (bridge, _rx) = WidgetBridge::new(1);
    let mut session = session(&fx, bridge);

    let err = session.load(None).await.unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert_eq!(session.state(), Loading);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_saved_shipping_info_is_reused() {
    let fx = Fixture::memory().await;
    fx.db.shipping_profiles().save(USER, &shipping_info()).await.unwrap();
    fx.add_to_cart(USER, line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)).await;
    let (bridge, _rx) = WidgetBridge::new(1);
    let mut session = session(&fx, bridge);

    session.load(None).await.unwrap();

    assert!(session.save_info());
    assert_eq!(session.shipping_info(), &shipping_info());
}
