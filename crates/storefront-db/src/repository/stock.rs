//! # Stock Ledger
//!
//! The single authoritative copy of available quantity per product.
//!
//! ## Advisory read vs. authoritative debit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  read(ids)                    reserve_and_debit(tx, id, qty)            │
//! │  ─────────                    ──────────────────────────────            │
//! │  pool connection              caller's transaction                      │
//! │  may be stale                 binding                                   │
//! │  UX fail-fast only            the ONLY stock check that counts          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Atomic compare-and-decrement
//! ```sql
//! UPDATE products SET stock = stock - :qty
//! WHERE id = :id AND is_active = 1 AND stock >= :qty
//! ```
//! The condition and the write are one statement, and SQLite admits one
//! writer at a time, so two concurrent debits can never both see the same
//! stock. Zero rows affected means the product is missing or short; a follow-up
//! read inside the same transaction tells which.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use storefront_core::StockRecord;

/// Result of one debit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Stock was decremented; `remaining` is what is left.
    Debited { remaining: i64 },
    /// Not enough stock; nothing was written.
    InsufficientStock { available: i64 },
    /// No active product with that id.
    NotFound,
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    id: String,
    name: String,
    stock: i64,
}

impl From<StockRow> for StockRecord {
    fn from(row: StockRow) -> Self {
        StockRecord {
            product_id: row.id,
            available_quantity: row.stock,
            name: row.name,
        }
    }
}

/// Advisory stock reads.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Reads stock for the given product ids.
    ///
    /// Unknown or inactive products are simply absent from the map.
    pub async fn read(&self, product_ids: &[String]) -> DbResult<HashMap<String, StockRecord>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, stock FROM products WHERE is_active = 1 AND id IN (");
        let mut ids = query.separated(", ");
        for id in product_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(")");

        let rows: Vec<StockRow> = query.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), StockRecord::from(row)))
            .collect())
    }

    /// Reads one product's stock.
    pub async fn get(&self, product_id: &str) -> DbResult<Option<StockRecord>> {
        let row: Option<StockRow> =
            sqlx::query_as("SELECT id, name, stock FROM products WHERE id = ?1 AND is_active = 1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(StockRecord::from))
    }
}

/// Debits `quantity` units of `product_id` inside the caller's transaction.
///
/// ## Arguments
/// * `conn` - the open order transaction (`&mut *tx`)
/// * `product_id` - product to debit
/// * `quantity` - total units requested across all variant lines
///
/// ## Returns
/// A [`DebitOutcome`]. Nothing is written unless the outcome is `Debited`.
/// Rolling back the transaction undoes a successful debit.
pub async fn reserve_and_debit(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<DebitOutcome> {
    let now = Utc::now();

    let debited = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - ?1,
            updated_at = ?3
        WHERE id = ?2 AND is_active = 1 AND stock >= ?1
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let current: Option<i64> =
        sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1 AND is_active = 1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    let outcome = match (debited.rows_affected(), current) {
        (1, Some(remaining)) => DebitOutcome::Debited { remaining },
        (_, None) => DebitOutcome::NotFound,
        (_, Some(available)) => DebitOutcome::InsufficientStock { available },
    };

    debug!(product_id, quantity, ?outcome, "Stock debit");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{DbConfig, Database};
    use crate::repository::catalog::NewProduct;
    use storefront_core::Money;

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        catalog
            .upsert(&NewProduct::new("p1", "Ankara Dress", Money::from_major(8_000), 2))
            .await
            .unwrap();
        catalog
            .upsert(&NewProduct::new("p2", "Aso Oke Cap", Money::from_major(3_000), 10))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_read_skips_unknown() {
        let db = seeded().await;
        let stock = db
            .stock()
            .read(&["p1".to_string(), "ghost".to_string()])
            .await
            .unwrap();

        assert_eq!(stock.len(), 1);
        assert_eq!(stock["p1"].available_quantity, 2);
        assert_eq!(stock["p1"].name, "Ankara Dress");
    }

    #[tokio::test]
    async fn test_debit_outcomes() {
        let db = seeded().await;
        let mut tx = db.begin().await.unwrap();

        assert_eq!(
            reserve_and_debit(&mut tx, "p1", 5).await.unwrap(),
            DebitOutcome::InsufficientStock { available: 2 }
        );
        assert_eq!(
            reserve_and_debit(&mut tx, "ghost", 1).await.unwrap(),
            DebitOutcome::NotFound
        );
        assert_eq!(
            reserve_and_debit(&mut tx, "p1", 2).await.unwrap(),
            DebitOutcome::Debited { remaining: 0 }
        );
        tx.commit().await.unwrap();

        assert_eq!(db.stock().get("p1").await.unwrap().unwrap().available_quantity, 0);
    }

    #[tokio::test]
    async fn test_rollback_restores_stock() {
        let db = seeded().await;
        {
            let mut tx = db.begin().await.unwrap();
            reserve_and_debit(&mut tx, "p2", 4).await.unwrap();
            // dropped without commit
        }
        assert_eq!(db.stock().get("p2").await.unwrap().unwrap().available_quantity, 10);
    }
}
