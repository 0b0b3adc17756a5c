//! Payment session manager.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use easecrypt_core::{PaymentSession, TransactionId, VirtualAccount, SETTLEMENT_CURRENCY};
use easecrypt_store::{Store, StoreError};

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session was ever opened for the transaction, or it was swept.
    #[error("no payment session for transaction {0}")]
    NotFound(TransactionId),

    /// The payment window closed.
    #[error("payment session for transaction {transaction_id} expired at {expires_at}")]
    Expired {
        /// Transaction concerned.
        transaction_id: TransactionId,
        /// When the window closed.
        expires_at: DateTime<Utc>,
    },

    /// Payment was already accepted through this session.
    #[error("payment session for transaction {0} is closed")]
    Closed(TransactionId),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Opens, completes and expires payment sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    ttl: Duration,
    bank_name: String,
    account_name: String,
}

impl SessionManager {
    /// Create a manager issuing sessions that last `ttl`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        ttl: Duration,
        bank_name: impl Into<String>,
        account_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ttl,
            bank_name: bank_name.into(),
            account_name: account_name.into(),
        }
    }

    /// Issue virtual account details for a payment of `amount_minor`.
    #[must_use]
    pub fn virtual_account(&self, reference: &str, amount_minor: i64) -> VirtualAccount {
        VirtualAccount {
            account_number: generate_account_number(),
            bank_name: self.bank_name.clone(),
            account_name: self.account_name.clone(),
            amount_minor,
            currency: SETTLEMENT_CURRENCY.to_string(),
            reference: reference.to_string(),
        }
    }

    /// Open a session for a transaction.
    pub fn create(
        &self,
        transaction_id: TransactionId,
        account: VirtualAccount,
    ) -> Result<PaymentSession, SessionError> {
        let session = PaymentSession::open(transaction_id, account, self.ttl, Utc::now());
        self.store.put_session(&session)?;

        tracing::debug!(
            transaction_id = %transaction_id,
            session_id = %session.id,
            expires_at = %session.expires_at,
            "Payment session opened"
        );
        Ok(session)
    }

    /// The session of a transaction, live or not.
    pub fn get(&self, transaction_id: &TransactionId) -> Result<Option<PaymentSession>, SessionError> {
        Ok(self.store.get_session_for_transaction(transaction_id)?)
    }

    /// The session of a transaction, provided it still accepts payment at `now`.
    pub fn active_for(
        &self,
        transaction_id: &TransactionId,
        now: DateTime<Utc>,
    ) -> Result<PaymentSession, SessionError> {
        let session = self
            .store
            .get_session_for_transaction(transaction_id)?
            .ok_or(SessionError::NotFound(*transaction_id))?;

        if session.is_expired_at(now) {
            return Err(SessionError::Expired {
                transaction_id: *transaction_id,
                expires_at: session.expires_at,
            });
        }
        if !session.is_active {
            return Err(SessionError::Closed(*transaction_id));
        }
        Ok(session)
    }

    /// Close the session once its payment is accepted.
    pub fn complete(&self, transaction_id: &TransactionId) -> Result<(), SessionError> {
        let mut session = self
            .store
            .get_session_for_transaction(transaction_id)?
            .ok_or(SessionError::NotFound(*transaction_id))?;
        session.is_active = false;
        self.store.put_session(&session)?;
        Ok(())
    }

    /// Remove every session expired at `now`, returning them.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<Vec<PaymentSession>, SessionError> {
        let removed = self.store.delete_expired_sessions(now)?;
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Expired payment sessions removed");
        }
        Ok(removed)
    }
}

/// A 10-digit NUBAN-shaped account number without a leading zero.
fn generate_account_number() -> String {
    rand::thread_rng()
        .gen_range(1_000_000_000_u64..10_000_000_000)
        .to_string()
}
