//! Coupon storage. Codes are looked up exactly as stored.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{Coupon, Discount};

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    code: String,
    discount_type: String,
    discount_value: String,
    is_active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DbError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let value = Decimal::from_str(row.discount_value.trim())
            .map_err(|e| DbError::decode("coupon", format!("{}: {}", row.code, e)))?;
        Ok(Coupon {
            discount: Discount::from_parts(&row.discount_type, value),
            code: row.code,
            is_active: row.is_active,
        })
    }
}

/// Repository for coupons.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Finds a coupon by its code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let row: Option<CouponRow> = sqlx::query_as(
            "SELECT code, discount_type, discount_value, is_active FROM coupons WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Issues a new coupon. Fails with `UniqueViolation` if the code exists.
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        debug!(code = %coupon.code, kind = coupon.discount.kind(), "Issuing coupon");

        sqlx::query(
            r#"
            INSERT INTO coupons (code, discount_type, discount_value, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&coupon.code)
        .bind(coupon.discount.kind())
        .bind(coupon.discount.value().normalize().to_string())
        .bind(coupon.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: coupon.code.clone(),
            },
            other => other,
        })?;

        Ok(())
    }
}
