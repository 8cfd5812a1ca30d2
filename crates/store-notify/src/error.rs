//! Notification Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Email delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Provider failed in a way worth retrying (5xx, 429)
    #[error("Email provider error ({status}): {body}")]
    Provider { status: u16, body: String },

    /// Provider refused the message (bad address, unverified sender...)
    #[error("Email rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Could not reach the provider
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Test double told to fail
    #[error("Simulated failure: {0}")]
    Simulated(String),
}

impl NotifyError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NotifyError::Provider { .. } | NotifyError::Network(_) | NotifyError::Simulated(_)
        )
    }

    /// Classify an HTTP failure status
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || status >= 500 {
            NotifyError::Provider { status, body }
        } else {
            NotifyError::Rejected { status, body }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(NotifyError::from_status(503, String::new()).is_retryable());
        assert!(NotifyError::from_status(429, String::new()).is_retryable());
        assert!(!NotifyError::from_status(400, String::new()).is_retryable());
    }
}
