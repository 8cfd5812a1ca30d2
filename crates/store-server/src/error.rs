//! Error responses

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use store_core::StoreError;
use store_payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error: status plus `{ error, code }` body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub type ApiResult<T> = Result<T, ApiError>;

pub fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.into(),
        }),
    )
}

pub fn unauthenticated() -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", "Please sign in to continue.")
}

pub fn forbidden() -> ApiError {
    api_error(StatusCode::FORBIDDEN, "FORBIDDEN", "You do not have permission to do that.")
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
}

/// Map a store error onto the HTTP taxonomy
pub fn store_error(err: StoreError) -> ApiError {
    let (status, code) = match &err {
        StoreError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        StoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        StoreError::InvalidProduct(_) => (StatusCode::BAD_REQUEST, "INVALID_PRODUCT"),
        StoreError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        StoreError::PersistenceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_UNAVAILABLE"),
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        StoreError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        StoreError::SlotTaken(_) => (StatusCode::CONFLICT, "SLOT_TAKEN"),
        StoreError::Persistence(_) | StoreError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    if status.is_server_error() {
        tracing::error!(error = %err, code, "Request failed");
    }
    api_error(status, code, err.user_message())
}

/// Map a payment error onto the HTTP taxonomy
pub fn payment_error(err: PaymentError) -> ApiError {
    let err = match err {
        PaymentError::Store(inner) => return store_error(inner),
        other => other,
    };
    let (status, code) = match &err {
        PaymentError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        PaymentError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        PaymentError::InvalidProduct(_) => (StatusCode::BAD_REQUEST, "INVALID_PRODUCT"),
        PaymentError::InvalidRequest(_) | PaymentError::WebhookParse(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_REQUEST")
        }
        PaymentError::InvalidSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        PaymentError::InvalidToken => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        PaymentError::ProviderUnavailable(_) | PaymentError::Stripe(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "PAYMENT_PROVIDER_UNAVAILABLE")
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, code, "Payment request failed");
    } else {
        tracing::debug!(error = %err, code, "Payment request rejected");
    }
    api_error(status, code, err.user_message())
}
