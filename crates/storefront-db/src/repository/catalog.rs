//! # Catalog Repository
//!
//! Server-held product prices. These, not the cart snapshots, are what every
//! committed order is priced from.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{CatalogEntry, Money};

/// A product to insert or refresh (seed data, tests, admin sync).
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub is_active: bool,
}

impl NewProduct {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Money, stock: i64) -> Self {
        NewProduct {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CatalogRow {
    id: String,
    name: String,
    price: String,
    is_active: bool,
}

impl TryFrom<CatalogRow> for CatalogEntry {
    type Error = DbError;

    fn try_from(row: CatalogRow) -> Result<Self, Self::Error> {
        let unit_price = Money::parse(&row.price).map_err(|e| DbError::decode("product", e))?;
        Ok(CatalogEntry {
            product_id: row.id,
            name: row.name,
            unit_price,
            is_active: row.is_active,
        })
    }
}

/// Repository for product rows.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts a product or overwrites name, price, stock and active flag.
    pub async fn upsert(&self, product: &NewProduct) -> DbResult<()> {
        let now = Utc::now();
        debug!(id = %product.id, price = %product.price, stock = product.stock, "Upserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                stock = excluded.stock,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price.to_storage_string())
        .bind(product.stock)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product's catalog entry (active or not).
    pub async fn get(&self, product_id: &str) -> DbResult<Option<CatalogEntry>> {
        let row: Option<CatalogRow> =
            sqlx::query_as("SELECT id, name, price, is_active FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(CatalogEntry::try_from).transpose()
    }

    /// Counts active products.
    pub async fn count_active(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Loads active catalog entries for `product_ids` inside a transaction.
///
/// Called after the stock debits, so the prices read are those of the same
/// snapshot the order commits against.
pub async fn prices_in(
    conn: &mut SqliteConnection,
    product_ids: &[&str],
) -> DbResult<HashMap<String, CatalogEntry>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, name, price, is_active FROM products WHERE is_active = 1 AND id IN (",
    );
    let mut ids = query.separated(", ");
    for id in product_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");

    let rows: Vec<CatalogRow> = query.build_query_as().fetch_all(&mut *conn).await?;

    rows.into_iter()
        .map(|row| CatalogEntry::try_from(row).map(|entry| (entry.product_id.clone(), entry)))
        .collect()
}
