//! Order placement against a real SQLite database.

mod common;

use std::sync::Arc;

use tokio::task::JoinSet;

use tracing_subscriber::fmt;

use common::{card, line, transfer, CapturedLogs, Fixture, FixedVerifier, USER};
use storefront_checkout::{CheckoutError, StockError};
use storefront_core::{Money, OrderStatus, PaymentMethod};

#[tokio::test]
async fn test_insufficient_stock_debits_nothing() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);

    let request = transfer(
        USER,
        vec![
            line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1),
            line("SHT-LIN", "Linen Shirt", 1_000, 5),
        ],
    );
    let err = fx.coordinator().place(&token, request).await.unwrap_err();

    match err {
        CheckoutError::Stock(StockError::InsufficientStock {
            product_id,
            name,
            available,
        }) => {
            assert_eq!(product_id, "SHT-LIN");
            assert_eq!(name, "Linen Shirt");
            assert_eq!(available, 2);
        }
        other => panic!("expected insufficient stock, got {:?}", other),
    }

    // the dress was debited first, then rolled back
    assert_eq!(fx.stock_of("DRS-ANK").await, 10);
    assert_eq!(fx.stock_of("SHT-LIN").await, 2);
    assert_eq!(fx.db.orders().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_variant_lines_share_product_stock() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);

    let mut small = line("SHT-LIN", "Linen Shirt", 1_000, 1);
    small.size = Some("S".into());
    let mut large = line("SHT-LIN", "Linen Shirt", 1_000, 2);
    large.size = Some("L".into());

    let err = fx
        .coordinator()
        .place(&token, transfer(USER, vec![small, large]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    assert_eq!(fx.stock_of("SHT-LIN").await, 2);
}

#[tokio::test]
async fn test_inactive_product_is_rejected() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);

    let err = fx
        .coordinator()
        .place(&token, transfer(USER, vec![line("KFT-OLD", "Old Kaftan", 3_000, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Stock(StockError::ProductNotFound { .. })
    ));
    assert_eq!(err.user_message(), "Old Kaftan no longer exists.");
}

#[tokio::test]
async fn test_catalog_price_wins_over_client_price() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);

    let mut request = transfer(USER, vec![line("DRS-ANK", "Ankara Wrap Dress", 1, 1)]);
    request.shipping_fee = Some(Money::from_major(0));

    let receipt = fx.coordinator().place(&token, request).await.unwrap();

    // 4,000 + 1,500 Lagos shipping + 300 tax
    assert_eq!(receipt.total, Money::from_major(5_800));

    let order = fx.db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.lines[0].unit_price, Money::from_major(4_000));
    assert_eq!(order.shipping, Money::from_major(1_500));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_method, PaymentMethod::Transfer);
    assert_eq!(order.payment_reference, None);
}

#[tokio::test]
async fn test_coupon_is_priced_on_the_server() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);

    let mut request = transfer(USER, vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)]);
    request.coupon_code = Some("WELCOME10".into());

    let receipt = fx.coordinator().place(&token, request).await.unwrap();

    // 4,000 - 400 + 1,500 + 270
    assert_eq!(receipt.total, Money::from_major(5_370));

    let order = fx.db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.discount, Money::from_major(400));
    assert_eq!(order.coupon_code.as_deref(), Some("WELCOME10"));
}

#[tokio::test]
async fn test_unsupported_coupon_is_ignored_at_placement() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);

    let mut request = transfer(USER, vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)]);
    request.coupon_code = Some("FLAT500".into());

    let receipt = fx.coordinator().place(&token, request).await.unwrap();
    assert_eq!(receipt.total, Money::from_major(5_800));
}

#[tokio::test]
async fn test_repeated_card_reference_replays_order() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);
    let lines = vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 2)];

    let first = fx
        .coordinator()
        .place(&token, card(USER, lines.clone(), "ref-replay"))
        .await
        .unwrap();
    let second = fx
        .coordinator()
        .place(&token, card(USER, lines, "ref-replay"))
        .await
        .unwrap();

    assert!(!first.replayed);
    assert_eq!(first.status, OrderStatus::Confirmed);
    assert!(second.replayed);
    assert_eq!(second.order_id, first.order_id);
    assert_eq!(second.total, first.total);

    assert_eq!(fx.db.orders().count().await.unwrap(), 1);
    assert_eq!(fx.stock_of("DRS-ANK").await, 8);
}

#[tokio::test]
async fn test_transfer_orders_are_never_replayed() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);
    let lines = vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)];

    let first = fx.coordinator().place(&token, transfer(USER, lines.clone())).await.unwrap();
    let second = fx.coordinator().place(&token, transfer(USER, lines)).await.unwrap();

    assert_ne!(first.order_id, second.order_id);
    assert!(!second.replayed);
    assert_eq!(fx.stock_of("DRS-ANK").await, 8);
}

#[tokio::test]
async fn test_concurrent_duplicate_card_submissions() {
    let fx = Fixture::file().await;
    let token = fx.token(USER);
    let coordinator = fx.coordinator();
    let lines = vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)];

    let a = {
        let coordinator = Arc::clone(&coordinator);
        let token = token.clone();
        let request = card(USER, lines.clone(), "ref-double-click");
        tokio::spawn(async move { coordinator.place(&token, request).await })
    };
    let b = {
        let coordinator = Arc::clone(&coordinator);
        let token = token.clone();
        let request = card(USER, lines, "ref-double-click");
        tokio::spawn(async move { coordinator.place(&token, request).await })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(a.order_id, b.order_id);
    assert!(a.replayed != b.replayed);
    assert_eq!(fx.db.orders().count().await.unwrap(), 1);
    assert_eq!(fx.stock_of("DRS-ANK").await, 9);
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let fx = Fixture::file().await;
    fx.set_stock("DRS-ANK", "Ankara Wrap Dress", 4_000, 5).await;
    let coordinator = fx.coordinator();

    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let coordinator = Arc::clone(&coordinator);
        let user_id = format!("buyer-{}", i);
        let token = fx.token(&user_id);
        let request = transfer(&user_id, vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)]);
        tasks.spawn(async move { coordinator.place(&token, request).await });
    }

    let mut placed = 0i64;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::Stock(StockError::InsufficientStock { available, .. })) => {
                assert_eq!(available, 0);
            }
            Err(other) => panic!("unexpected placement error: {:?}", other),
        }
    }

    // Every buyer's transaction waits out the others, so exactly the
    // available units sell.
    assert_eq!(placed, 5);
    assert_eq!(fx.stock_of("DRS-ANK").await, 0);
    assert_eq!(fx.db.orders().count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_token_for_another_user_is_rejected() {
    let fx = Fixture::memory().await;
    let token = fx.token("someone-else");

    let err = fx
        .coordinator()
        .place(&token, transfer(USER, vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)]))
        .await
        .unwrap_err();

    assert!(err.requires_reauthentication());
    assert_eq!(fx.stock_of("DRS-ANK").await, 10);
}

#[tokio::test]
async fn test_reconcile_transfer_order() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);

    let receipt = fx
        .coordinator()
        .place(&token, transfer(USER, vec![line("SHT-LIN", "Linen Shirt", 1_000, 1)]))
        .await
        .unwrap();

    let order = fx
        .coordinator()
        .reconcile(&receipt.order_id, OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);

    let stored = fx.db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Confirmed);

    assert!(fx
        .coordinator()
        .reconcile(&receipt.order_id, OrderStatus::Pending)
        .await
        .is_err());
}

#[tokio::test]
async fn test_rejected_card_reference_debits_nothing() {
    let fx = Fixture::memory_with_verifier(Arc::new(FixedVerifier { charged: None })).await;
    let token = fx.token(USER);

    let err = fx
        .coordinator()
        .place(&token, card(USER, vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)], "SF-UNKNOWN"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentGateway(_)));
    assert_eq!(fx.stock_of("DRS-ANK").await, 10);
    assert_eq!(fx.db.orders().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_undercharged_card_order_is_rolled_back() {
    // ₦1 charged against a ₦5,800 order
    let fx = Fixture::memory_with_verifier(Arc::new(FixedVerifier { charged: Some(100) })).await;
    let token = fx.token(USER);

    let err = fx
        .coordinator()
        .place(&token, card(USER, vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)], "SF-SHORT"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentGateway(_)));
    assert_eq!(fx.stock_of("DRS-ANK").await, 10);
    assert_eq!(fx.db.orders().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_fully_charged_card_order_is_placed() {
    let fx = Fixture::memory_with_verifier(Arc::new(FixedVerifier { charged: Some(580_000) })).await;
    let token = fx.token(USER);

    let receipt = fx
        .coordinator()
        .place(&token, card(USER, vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)], "SF-PAID"))
        .await
        .unwrap();

    assert_eq!(receipt.status, OrderStatus::Confirmed);
    assert_eq!(receipt.total, Money::from_major(5_800));
    assert_eq!(fx.stock_of("DRS-ANK").await, 9);
}

#[tokio::test]
async fn test_card_order_lost_to_stock_is_flagged_for_reconciliation() {
    let fx = Fixture::memory().await;
    let token = fx.token(USER);

    let logs = CapturedLogs::default();
    let subscriber = fmt().with_ansi(false).with_writer(logs.clone()).finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let err = fx
        .coordinator()
        .place(&token, card(USER, vec![line("SHT-LIN", "Linen Shirt", 1_000, 5)], "SF-NOSTOCK"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Stock(StockError::InsufficientStock { .. })));
    let output = logs.contents();
    assert!(output.contains("SF-NOSTOCK"), "log output: {}", output);
    assert!(output.contains("manual reconciliation"), "log output: {}", output);
}

#[tokio::test]
async fn test_undercharge_is_flagged_for_reconciliation() {
    let fx = Fixture::memory_with_verifier(Arc::new(FixedVerifier { charged: Some(100) })).await;
    let token = fx.token(USER);

    let logs = CapturedLogs::default();
    let subscriber = fmt().with_ansi(false).with_writer(logs.clone()).finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    fx.coordinator()
        .place(&token, card(USER, vec![line("DRS-ANK", "Ankara Wrap Dress", 4_000, 1)], "SF-SHORT"))
        .await
        .unwrap_err();

    let output = logs.contents();
    assert!(output.contains("SF-SHORT"), "log output: {}", output);
    assert!(output.contains("manual reconciliation"), "log output: {}", output);
}
