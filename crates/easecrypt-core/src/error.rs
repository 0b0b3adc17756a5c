//! Error types for the on-ramp domain.

use crate::ids::IdError;
use crate::transaction::PaymentStatus;
use crate::validation::ValidationErrors;
use crate::{TokenSymbol, TransactionId};

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by domain logic.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A rate with a non-positive price was offered.
    #[error("invalid rate for {symbol}: {price_minor}")]
    InvalidRate {
        /// Token priced.
        symbol: TokenSymbol,
        /// Offending price.
        price_minor: i64,
    },

    /// Neither a current nor a fallback rate is known.
    #[error("no rate available for {0}")]
    RateUnavailable(TokenSymbol),

    /// A status change the lifecycle does not allow.
    #[error("invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// Transaction concerned.
        id: TransactionId,
        /// Current status.
        from: PaymentStatus,
        /// Requested status.
        to: PaymentStatus,
    },

    /// The transaction reached a terminal status and accepts no changes.
    #[error("transaction {id} is {status} and can no longer change")]
    Terminal {
        /// Transaction concerned.
        id: TransactionId,
        /// Its terminal status.
        status: PaymentStatus,
    },

    /// A guarded update found the transaction in another status.
    #[error("transaction {id} is {actual}, expected {expected}")]
    UnexpectedStatus {
        /// Transaction concerned.
        id: TransactionId,
        /// Status the update required.
        expected: PaymentStatus,
        /// Status found.
        actual: PaymentStatus,
    },

    /// An amount too large to price or add up without overflow.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),

    /// The fee breakdown does not add up.
    #[error("inconsistent fee breakdown: {0}")]
    InconsistentFees(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
