//! Payment Error Types

use store_core::StoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// No authenticated identity
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Cart references a product the catalog does not have
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// Malformed cart or request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Payment provider unreachable or timed out
    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Payment provider refused the request
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    InvalidSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Download token failed verification
    #[error("Invalid download token")]
    InvalidToken,

    /// Storage error
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthenticated => PaymentError::Unauthenticated,
            StoreError::InvalidProduct(id) => PaymentError::InvalidProduct(id),
            StoreError::InvalidRequest(msg) => PaymentError::InvalidRequest(msg),
            other => PaymentError::Store(other),
        }
    }
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ProviderUnavailable(_) => true,
            PaymentError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Unauthenticated => "Please sign in to check out.".into(),
            PaymentError::InvalidProduct(id) => format!("Unknown product '{}'.", id),
            PaymentError::InvalidRequest(msg) => msg.clone(),
            PaymentError::ProviderUnavailable(_) => {
                "Payment processing is temporarily unavailable. Please try again.".into()
            }
            PaymentError::Stripe(_) => "Payment processing failed. Please try again.".into(),
            PaymentError::InvalidSignature(_) => "Invalid signature.".into(),
            PaymentError::InvalidToken => "This download link is not valid.".into(),
            PaymentError::Store(e) => e.user_message(),
            PaymentError::WebhookParse(_) => "An error occurred processing your request.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        assert!(matches!(
            PaymentError::from(StoreError::InvalidProduct("x".into())),
            PaymentError::InvalidProduct(_)
        ));
        let err = PaymentError::from(StoreError::PersistenceUnavailable("down".into()));
        assert!(err.is_retryable());
        assert!(PaymentError::ProviderUnavailable("timeout".into()).is_retryable());
        assert!(!PaymentError::InvalidSignature("bad".into()).is_retryable());
    }
}
