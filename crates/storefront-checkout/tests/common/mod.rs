//! Shared fixtures for checkout integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;

use storefront_checkout::{
    CheckoutConfig, CheckoutError, CheckoutResult, LocalBackend, OrderPlacementCoordinator, PaymentVerifier,
    PlacementRequest, SessionAuthority,
};
use storefront_core::{CartLine, Coupon, Discount, Money, PaymentMethod, PaymentReference, ShippingInfo};
use storefront_db::{Database, DbConfig, NewProduct};

pub const USER: &str = "user-001";

pub struct Fixture {
    pub db: Database,
    pub backend: Arc<LocalBackend>,
    pub config: CheckoutConfig,
    /// Keeps a file-backed database alive for the test.
    _dir: Option<TempDir>,
}

impl Fixture {
    /// Single-connection in-memory database.
    pub async fn memory() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Self::with_db(db, None, None).await
    }

    /// In-memory database with card references checked by `verifier`.
    pub async fn memory_with_verifier(verifier: Arc<dyn PaymentVerifier>) -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Self::with_db(db, None, Some(verifier)).await
    }

    /// File-backed database with a real connection pool, for concurrency.
    pub async fn file() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("checkout.db")).max_connections(8))
            .await
            .unwrap();
        Self::with_db(db, Some(dir), None).await
    }

    async fn with_db(db: Database, dir: Option<TempDir>, verifier: Option<Arc<dyn PaymentVerifier>>) -> Self {
        let config = CheckoutConfig {
            jwt_secret: "integration-secret".to_string(),
            notifications_enabled: false,
            ..Default::default()
        };

        seed(&db).await;

        let backend = Arc::new(LocalBackend::from_config(db.clone(), &config, verifier));
        Fixture {
            db,
            backend,
            config,
            _dir: dir,
        }
    }

    pub fn authority(&self) -> &SessionAuthority {
        self.backend.authority()
    }

    pub fn coordinator(&self) -> Arc<OrderPlacementCoordinator> {
        Arc::clone(self.backend.coordinator())
    }

    pub fn token(&self, user_id: &str) -> String {
        self.authority().issue(user_id).unwrap()
    }

    pub async fn stock_of(&self, product_id: &str) -> i64 {
        self.db
            .stock()
            .get(product_id)
            .await
            .unwrap()
            .map(|r| r.available_quantity)
            .unwrap_or(0)
    }

    pub async fn set_stock(&self, product_id: &str, name: &str, price: i64, stock: i64) {
        self.db
            .catalog()
            .upsert(&NewProduct::new(product_id, name, Money::from_major(price), stock))
            .await
            .unwrap();
    }

    pub async fn add_to_cart(&self, user_id: &str, line: CartLine) {
        self.db.carts().add_line(user_id, &line).await.unwrap();
    }
}

/// Gateway stand-in: reports a fixed charge in kobo, or rejects every
/// reference when `charged` is `None`.
pub struct FixedVerifier {
    pub charged: Option<i64>,
}

#[async_trait]
impl PaymentVerifier for FixedVerifier {
    async fn verify(&self, reference: &PaymentReference) -> CheckoutResult<i64> {
        self.charged
            .ok_or_else(|| CheckoutError::PaymentGateway(format!("unknown reference {}", reference)))
    }
}

/// Log sink for tests that assert on emitted tracing events.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Catalog: a dress at ₦4,000 (10 left) and a shirt at ₦1,000 (2 left).
async fn seed(db: &Database) {
    let products = [
        NewProduct::new("DRS-ANK", "Ankara Wrap Dress", Money::from_major(4_000), 10),
        NewProduct::new("SHT-LIN", "Linen Shirt", Money::from_major(1_000), 2),
        NewProduct::new("KFT-OLD", "Old Kaftan", Money::from_major(3_000), 5).inactive(),
    ];
    for product in &products {
        db.catalog().upsert(product).await.unwrap();
    }

    let coupons = [
        ("WELCOME10", "percentage", 10, true),
        ("FLAT500", "amount", 500, true),
    ];
    for (code, kind, value, is_active) in coupons {
        db.coupons()
            .insert(&Coupon {
                code: code.to_string(),
                discount: Discount::from_parts(kind, Decimal::from(value)),
                is_active,
            })
            .await
            .unwrap();
    }
}

pub fn line(product_id: &str, name: &str, price: i64, quantity: i64) -> CartLine {
    CartLine {
        product_id: product_id.to_string(),
        name: name.to_string(),
        unit_price_snapshot: Money::from_major(price),
        quantity,
        size: None,
        color: None,
    }
}

pub fn shipping_info() -> ShippingInfo {
    ShippingInfo {
        first_name: "Ada".into(),
        last_name: "Obi".into(),
        email: "ada@example.ng".into(),
        phone: "+234 803 123 4567".into(),
        address: "12 Marina Road".into(),
        city: "Ikeja".into(),
        state: "Lagos".into(),
        zip_code: "100001".into(),
    }
}

pub fn transfer(user_id: &str, lines: Vec<CartLine>) -> PlacementRequest {
    PlacementRequest {
        user_id: user_id.to_string(),
        line_items: lines,
        shipping_info: shipping_info(),
        payment_method: PaymentMethod::Transfer,
        payment_reference: None,
        shipping_fee: None,
        note: None,
        coupon_code: None,
    }
}

pub fn card(user_id: &str, lines: Vec<CartLine>, reference: &str) -> PlacementRequest {
    PlacementRequest {
        payment_method: PaymentMethod::Card,
        payment_reference: Some(PaymentReference::new(reference)),
        ..transfer(user_id, lines)
    }
}
