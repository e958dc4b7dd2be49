//! Server-held carts.
//!
//! A cart line keeps the price the shopper saw when adding the item. That
//! snapshot drives the on-screen estimate only.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{CartLine, Money};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    product_id: String,
    name: String,
    unit_price: String,
    quantity: i64,
    size: Option<String>,
    color: Option<String>,
}

impl TryFrom<CartRow> for CartLine {
    type Error = DbError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        Ok(CartLine {
            unit_price_snapshot: Money::parse(&row.unit_price)
                .map_err(|e| DbError::decode("cart item", e))?,
            product_id: row.product_id,
            name: row.name,
            quantity: row.quantity,
            size: row.size,
            color: row.color,
        })
    }
}

/// Repository for `cart_items`.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// A user's cart lines in the order they were added.
    pub async fn lines(&self, user_id: &str) -> DbResult<Vec<CartLine>> {
        let rows: Vec<CartRow> = sqlx::query_as(
            r#"
            SELECT product_id, name, unit_price, quantity, size, color
            FROM cart_items
            WHERE user_id = ?1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    /// Appends a line to a user's cart.
    pub async fn add_line(&self, user_id: &str, line: &CartLine) -> DbResult<()> {
        debug!(user_id, product_id = %line.product_id, quantity = line.quantity, "Adding cart line");

        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, name, unit_price, quantity, size, color, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(user_id)
        .bind(&line.product_id)
        .bind(&line.name)
        .bind(line.unit_price_snapshot.to_storage_string())
        .bind(line.quantity)
        .bind(&line.size)
        .bind(&line.color)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Empties a user's cart. Returns the number of lines removed.
    pub async fn clear(&self, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        debug!(user_id, removed = result.rows_affected(), "Cart cleared");
        Ok(result.rows_affected())
    }
}
