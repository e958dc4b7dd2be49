//! # Order Repository
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. INSERT (inside the coordinator's transaction)                       │
//! │     └── insert_order(tx, order) → orders + order_lines                  │
//! │         card:     status = confirmed, payment_reference = Some          │
//! │         transfer: status = pending,   payment_reference = None          │
//! │                                                                         │
//! │  2. RECONCILE (transfer only)                                           │
//! │     └── update_status(id, Pending → Confirmed | Failed)                 │
//! │                                                                         │
//! │  Everything else about an order is immutable.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dedup key
//! `UNIQUE (user_id, payment_reference) WHERE payment_reference IS NOT NULL`.
//! A second card order with the same reference fails on insert with
//! `DbError::UniqueViolation`; the coordinator turns that into a replay of
//! the first order.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{Money, Order, OrderLine, OrderStatus, PaymentMethod, ShippingInfo};

const ORDER_COLUMNS: &str = r#"
    id, user_id, shipping_info, payment_method, payment_reference,
    subtotal, discount, shipping, tax, total,
    status, note, coupon_code, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    shipping_info: String,
    payment_method: PaymentMethod,
    payment_reference: Option<String>,
    subtotal: String,
    discount: String,
    shipping: String,
    tax: String,
    total: String,
    status: OrderStatus,
    note: Option<String>,
    coupon_code: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    product_id: String,
    name: String,
    unit_price: String,
    quantity: i64,
    line_total: String,
    size: Option<String>,
    color: Option<String>,
}

fn money(field: &str, text: &str) -> DbResult<Money> {
    Money::parse(text).map_err(|e| DbError::decode("order", format!("{field}: {e}")))
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> DbResult<Order> {
        let shipping_info: ShippingInfo = serde_json::from_str(&self.shipping_info)
            .map_err(|e| DbError::decode("order", format!("shipping_info: {e}")))?;

        Ok(Order {
            subtotal: money("subtotal", &self.subtotal)?,
            discount: money("discount", &self.discount)?,
            shipping: money("shipping", &self.shipping)?,
            tax: money("tax", &self.tax)?,
            total: money("total", &self.total)?,
            id: self.id,
            user_id: self.user_id,
            lines,
            shipping_info,
            payment_method: self.payment_method,
            payment_reference: self.payment_reference,
            status: self.status,
            note: self.note,
            coupon_code: self.coupon_code,
            created_at: self.created_at,
        })
    }
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = DbError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(OrderLine {
            unit_price: money("unit_price", &row.unit_price)?,
            line_total: money("line_total", &row.line_total)?,
            product_id: row.product_id,
            name: row.name,
            quantity: row.quantity,
            size: row.size,
            color: row.color,
        })
    }
}

/// Repository for placed orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => {
                let lines = self.lines_for(&row.id).await?;
                row.into_order(lines).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Finds the order a user placed with a given card payment reference.
    pub async fn find_by_reference(&self, user_id: &str, reference: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 AND payment_reference = ?2"
        ))
        .bind(user_id)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let lines = self.lines_for(&row.id).await?;
                row.into_order(lines).map(Some)
            }
            None => Ok(None),
        }
    }

    /// A user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.lines_for(&row.id).await?;
            orders.push(row.into_order(lines)?);
        }
        Ok(orders)
    }

    /// Moves an order from `from` to `to`.
    ///
    /// ## Returns
    /// `true` if the order was in `from` and is now `to`; `false` if it was
    /// in some other status (nothing written).
    pub async fn update_status(&self, id: &str, from: OrderStatus, to: OrderStatus) -> DbResult<bool> {
        debug!(order_id = %id, %from, %to, "Updating order status");

        let result = sqlx::query(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Total number of orders (diagnostics, tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn lines_for(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let rows: Vec<OrderLineRow> = sqlx::query_as(
            r#"
            SELECT product_id, name, unit_price, quantity, line_total, size, color
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderLine::try_from).collect()
    }
}

/// Inserts an order and its lines inside the caller's transaction.
///
/// ## Errors
/// `DbError::UniqueViolation` when the user already has an order with the
/// same payment reference.
pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(
        order_id = %order.id,
        user_id = %order.user_id,
        lines = order.lines.len(),
        total = %order.total,
        "Inserting order"
    );

    let shipping_info = serde_json::to_string(&order.shipping_info)
        .map_err(|e| DbError::Internal(format!("shipping_info: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, shipping_info, payment_method, payment_reference,
            subtotal, discount, shipping, tax, total,
            status, note, coupon_code, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?14
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(shipping_info)
    .bind(order.payment_method)
    .bind(&order.payment_reference)
    .bind(order.subtotal.to_storage_string())
    .bind(order.discount.to_storage_string())
    .bind(order.shipping.to_storage_string())
    .bind(order.tax.to_storage_string())
    .bind(order.total.to_storage_string())
    .bind(order.status)
    .bind(&order.note)
    .bind(&order.coupon_code)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;

    for (line_no, line) in order.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_lines (
                order_id, line_no, product_id, name, unit_price,
                quantity, line_total, size, color
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&order.id)
        .bind(line_no as i64)
        .bind(&line.product_id)
        .bind(&line.name)
        .bind(line.unit_price.to_storage_string())
        .bind(line.quantity)
        .bind(line.line_total.to_storage_string())
        .bind(&line.size)
        .bind(&line.color)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
