//! Transaction ledger.
//!
//! The only writer of transactions. Every update is a read-apply-compare-put
//! cycle, so lifecycle rules are checked against the version actually being
//! replaced and concurrent writers cannot silently overwrite each other.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use easecrypt_core::{CoreError, NewTransaction, Transaction, TransactionId, TransactionUpdate};
use easecrypt_store::{Store, StoreError};

/// How many times a lost compare-and-put race is retried.
pub const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Default page size for wallet history.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Unknown transaction.
    #[error("transaction not found: {0}")]
    NotFound(TransactionId),

    /// Domain rule violated.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every attempt lost a race with another writer.
    #[error("transaction {id} is being modified concurrently (gave up after {attempts} attempts)")]
    Contention {
        /// Transaction concerned.
        id: TransactionId,
        /// Attempts made.
        attempts: usize,
    },
}

/// One page of a wallet's history.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    /// Transactions, newest first.
    pub transactions: Vec<Transaction>,
    /// Whether more exist past this page.
    pub has_more: bool,
}

/// The transaction ledger.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    /// Create a ledger over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a new `pending` transaction.
    pub fn create(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        let transaction = Transaction::create(new, Utc::now())?;
        self.store.insert_transaction(&transaction)?;

        tracing::info!(
            transaction_id = %transaction.id,
            token_symbol = %transaction.token_symbol,
            amount_minor = transaction.amount_minor,
            total_cost_minor = transaction.total_cost_minor,
            "Transaction created"
        );
        Ok(transaction)
    }

    /// Fetch a transaction.
    pub fn get(&self, id: &TransactionId) -> Result<Transaction, LedgerError> {
        self.store
            .get_transaction(id)?
            .ok_or(LedgerError::NotFound(*id))
    }

    /// Apply a partial update, enforcing the lifecycle.
    ///
    /// Lost races are retried against the fresh version, so a transition
    /// that became illegal in the meantime fails instead of clobbering.
    pub fn update(
        &self,
        id: &TransactionId,
        update: &TransactionUpdate,
    ) -> Result<Transaction, LedgerError> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self.get(id)?;
            let mut next = current.clone();
            next.apply(update, Utc::now())?;

            match self.store.compare_and_put_transaction(current.updated_at, &next) {
                Ok(()) => {
                    if current.payment_status != next.payment_status {
                        tracing::info!(
                            transaction_id = %id,
                            from = %current.payment_status,
                            to = %next.payment_status,
                            "Transaction status changed"
                        );
                    }
                    return Ok(next);
                }
                Err(StoreError::Conflict(_)) => {
                    tracing::debug!(transaction_id = %id, attempt, "Lost update race, retrying");
                }
                Err(StoreError::NotFound) => return Err(LedgerError::NotFound(*id)),
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(transaction_id = %id, "Giving up on contended transaction update");
        Err(LedgerError::Contention {
            id: *id,
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }

    /// Locate a transaction by the reference its payment is matched on.
    pub fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.store.find_transaction_by_reference(reference)?)
    }

    /// A wallet's history, newest first.
    ///
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn list_by_wallet(
        &self,
        wallet_address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionPage, LedgerError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let mut transactions = self
            .store
            .list_transactions_by_wallet(wallet_address, limit + 1, offset)?;

        let has_more = transactions.len() > limit;
        transactions.truncate(limit);
        Ok(TransactionPage {
            transactions,
            has_more,
        })
    }
}
