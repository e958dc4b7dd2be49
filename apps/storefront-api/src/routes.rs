//! HTTP routes.
//!
//! ```text
//! POST /api/orders            place an order (Bearer token)     201 receipt
//! GET  /api/coupons/{code}    active coupon lookup              200 | 404
//! POST /api/stock             advisory stock read               200
//! GET  /api/shipping-zones    zone table + default fee          200
//! GET  /health                database reachability             200 | 503
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use storefront_checkout::{extract_bearer_token, CheckoutError, LocalBackend, PlacementReceipt, PlacementRequest};
use storefront_core::{Discount, PricingEngine, ShippingRateTable, StockRecord};

use crate::error::{ApiError, ApiResult};

/// Shared state for all handlers.
pub struct ApiState {
    pub backend: LocalBackend,
    pub pricing: PricingEngine,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/orders", post(place_order))
        .route("/api/coupons/{code}", get(get_coupon))
        .route("/api/stock", post(read_stock))
        .route("/api/shipping-zones", get(shipping_zones))
        .route("/health", get(health))
        .with_state(state)
}

async fn place_order(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(request): Json<PlacementRequest>,
) -> ApiResult<(StatusCode, Json<PlacementReceipt>)> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or(ApiError::MissingToken)?;

    let receipt = state.backend.coordinator().place(token, request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CouponView {
    code: String,
    #[serde(flatten)]
    discount: Discount,
}

async fn get_coupon(State(state): State<Arc<ApiState>>, Path(code): Path<String>) -> ApiResult<Json<CouponView>> {
    match state.backend.coupons().lookup(&code).await? {
        Some(coupon) if coupon.is_active => Ok(Json(CouponView {
            code: coupon.code,
            discount: coupon.discount,
        })),
        _ => {
            debug!(code = %code, "Coupon lookup missed");
            Err(ApiError::NotFound("Coupon".to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockQuery {
    product_ids: Vec<String>,
}

async fn read_stock(
    State(state): State<Arc<ApiState>>,
    Json(query): Json<StockQuery>,
) -> ApiResult<Json<HashMap<String, StockRecord>>> {
    let stock = state
        .backend
        .database()
        .stock()
        .read(&query.product_ids)
        .await
        .map_err(CheckoutError::from)?;
    Ok(Json(stock))
}

async fn shipping_zones(State(state): State<Arc<ApiState>>) -> Json<ShippingRateTable> {
    Json(state.pricing.shipping_table().clone())
}

async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    if state.backend.database().health_check().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
    }
}
