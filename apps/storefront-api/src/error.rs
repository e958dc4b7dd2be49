//! Error responses for the HTTP boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use storefront_checkout::CheckoutError;

/// API errors, rendered as `{code, message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Checkout(#[from] CheckoutError),

    #[error("Missing or malformed Authorization header")]
    MissingToken,

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Checkout(e) => match e {
                CheckoutError::Validation(_) | CheckoutError::InvalidRequest(_) | CheckoutError::EmptyCart => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::Auth(_) => StatusCode::UNAUTHORIZED,
                CheckoutError::Stock(_) => StatusCode::CONFLICT,
                CheckoutError::CouponInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::PaymentCancelled | CheckoutError::PaymentGateway(_) => StatusCode::PAYMENT_REQUIRED,
                CheckoutError::PaymentTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                CheckoutError::Busy | CheckoutError::InvalidState { .. } => StatusCode::CONFLICT,
                CheckoutError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
                CheckoutError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::Checkout(e) => ErrorBody {
                code: e.code(),
                message: e.user_message(),
            },
            ApiError::MissingToken => ErrorBody {
                code: "UNAUTHENTICATED",
                message: "Session expired. Please log in again".to_string(),
            },
            ApiError::NotFound(what) => ErrorBody {
                code: "NOT_FOUND",
                message: format!("{} not found", what),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_checkout::StockError;

    #[test]
    fn test_stock_error_is_conflict() {
        let err = ApiError::from(CheckoutError::Stock(StockError::InsufficientStock {
            product_id: "SHT-LIN".into(),
            name: "Linen Shirt".into(),
            available: 2,
        }));

        assert_eq!(err.status(), StatusCode::CONFLICT);
        let body = err.body();
        assert_eq!(body.code, "INSUFFICIENT_STOCK");
        assert_eq!(body.message, "Sorry, Linen Shirt is out of stock (Only 2 left).");
    }

    #[test]
    fn test_persistence_details_are_hidden() {
        let err = ApiError::from(CheckoutError::Persistence("disk I/O error".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.body().message.contains("disk"));
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        assert_eq!(ApiError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::MissingToken.body().code, "UNAUTHENTICATED");
    }
}
