//! Client error types.

use crate::types::Violation;

/// Errors that can occur when using the EaseCrypt client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request failed validation.
    #[error("invalid request: {} violation(s)", violations.len())]
    Validation {
        /// Every violated constraint.
        violations: Vec<Violation>,
    },

    /// No rate is known for the token.
    #[error("rate unavailable: {0}")]
    RateUnavailable(String),

    /// Unknown transaction or wallet.
    #[error("not found: {0}")]
    NotFound(String),

    /// The payment window closed.
    #[error("payment session expired: {0}")]
    SessionExpired(String),

    /// The transaction did not finish in time.
    #[error("transaction {transaction_id} still {status} after waiting")]
    Timeout {
        /// Transaction polled.
        transaction_id: String,
        /// Last status seen.
        status: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
