//! Store Error Types

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store error taxonomy
#[derive(Error, Debug)]
pub enum StoreError {
    /// No identity attached to the request
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Identity is known but not allowed to perform the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Product id (or alias) not present in the catalog
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// Malformed input (empty cart, zero quantity, bad date...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Backing store unreachable, unprovisioned or timed out
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Backing store answered with something we could not interpret
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Order or booking not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// State machine refused the transition
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Another confirmed booking already holds the slot
    #[error("Slot already booked: {0}")]
    SlotTaken(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::PersistenceUnavailable(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Unauthenticated => "Please sign in to continue.".into(),
            StoreError::Forbidden(_) => "You do not have permission to do that.".into(),
            StoreError::InvalidProduct(id) => format!("Unknown product '{}'.", id),
            StoreError::InvalidRequest(msg) => msg.clone(),
            StoreError::PersistenceUnavailable(_) => {
                "The store is temporarily unavailable. Please try again.".into()
            }
            StoreError::NotFound(what) => format!("{} was not found.", what),
            StoreError::InvalidTransition { from, to } => {
                format!("Cannot move from '{}' to '{}'.", from, to)
            }
            StoreError::SlotTaken(slot) => format!("The slot {} is already booked.", slot),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
