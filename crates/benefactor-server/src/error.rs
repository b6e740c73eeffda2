//! HTTP error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use benefactor_payments::PaymentError;
use benefactor_records::RecordError;
use benefactor_shop::ShopError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} {id} not found"))
    }

    pub fn payments_disabled() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code.into(),
            }),
        )
            .into_response()
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::NotFound(id) => Self::not_found("Record", &id),
            RecordError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "INVALID_TRANSITION", e.to_string())
            }
            RecordError::Validation(msg) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", msg)
            }
            RecordError::Duplicate(_) => Self::new(StatusCode::CONFLICT, "DUPLICATE", e.to_string()),
            RecordError::Io(_) | RecordError::Serialization(_) => {
                tracing::error!(error = %e, "Storage failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "Could not access stored records",
                )
            }
        }
    }
}

impl From<ShopError> for ApiError {
    fn from(e: ShopError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_CART", e.to_string())
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Record(inner) => inner.into(),
            PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
                tracing::warn!(error = %e, "Rejected webhook");
                Self::bad_request("INVALID_WEBHOOK", e.user_message())
            }
            PaymentError::Amount(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_AMOUNT", e.user_message())
            }
            PaymentError::Stripe(_) => {
                tracing::error!(error = %e, "Checkout error");
                Self::new(StatusCode::BAD_GATEWAY, "CHECKOUT_ERROR", e.user_message())
            }
            PaymentError::Config(_) => {
                tracing::error!(error = %e, "Payment configuration error");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED", e.user_message())
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::new(rejection.status(), "INVALID_BODY", rejection.body_text())
    }
}
