//! Saved shipping details ("save this information for next time").

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::ShippingInfo;

/// Repository for `shipping_profiles`, one row per user.
#[derive(Debug, Clone)]
pub struct ShippingProfileRepository {
    pool: SqlitePool,
}

impl ShippingProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShippingProfileRepository { pool }
    }

    /// Loads a user's saved shipping info, if any.
    pub async fn get(&self, user_id: &str) -> DbResult<Option<ShippingInfo>> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT shipping_info FROM shipping_profiles WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        stored
            .map(|json| serde_json::from_str(&json).map_err(|e| DbError::decode("shipping profile", e)))
            .transpose()
    }

    /// Saves (or replaces) a user's shipping info.
    pub async fn save(&self, user_id: &str, info: &ShippingInfo) -> DbResult<()> {
        debug!(user_id, "Saving shipping profile");

        let json = serde_json::to_string(info)
            .map_err(|e| DbError::Internal(format!("shipping profile: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO shipping_profiles (user_id, shipping_info, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (user_id) DO UPDATE SET
                shipping_info = excluded.shipping_info,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
