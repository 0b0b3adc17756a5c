//! In-memory storage backend.
//!
//! Used by tests and by deployments built without `rocksdb-backend`. All
//! state lives behind one `RwLock`, which makes every trait method atomic.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use easecrypt_core::{CryptoRate, PaymentSession, TokenSymbol, Transaction, TransactionId};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Debug, Default)]
struct Tables {
    transactions: HashMap<TransactionId, Transaction>,
    by_wallet: HashMap<String, BTreeSet<TransactionId>>,
    by_reference: HashMap<String, TransactionId>,
    sessions: HashMap<TransactionId, PaymentSession>,
    rates: HashMap<TokenSymbol, CryptoRate>,
}

impl Tables {
    fn reference_owner(&self, reference: Option<&String>) -> Option<TransactionId> {
        reference.and_then(|r| self.by_reference.get(r).copied())
    }
}

/// A thread-safe, process-local [`Store`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for InMemoryStore {
    fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let mut tables = self.write();

        if tables.transactions.contains_key(&transaction.id) {
            return Err(StoreError::Duplicate(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }
        if let Some(owner) = tables.reference_owner(transaction.payment_reference.as_ref()) {
            return Err(StoreError::Duplicate(format!(
                "payment reference already used by {owner}"
            )));
        }

        if let Some(reference) = &transaction.payment_reference {
            tables.by_reference.insert(reference.clone(), transaction.id);
        }
        tables
            .by_wallet
            .entry(transaction.wallet_address.clone())
            .or_default()
            .insert(transaction.id);
        tables.transactions.insert(transaction.id, transaction.clone());
        Ok(())
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        Ok(self.read().transactions.get(transaction_id).cloned())
    }

    fn compare_and_put_transaction(
        &self,
        expected_updated_at: DateTime<Utc>,
        transaction: &Transaction,
    ) -> Result<()> {
        let mut tables = self.write();

        let previous_reference = {
            let stored = tables
                .transactions
                .get(&transaction.id)
                .ok_or(StoreError::NotFound)?;
            if stored.updated_at != expected_updated_at {
                return Err(StoreError::Conflict(format!(
                    "transaction {} was modified concurrently",
                    transaction.id
                )));
            }
            stored.payment_reference.clone()
        };

        if previous_reference != transaction.payment_reference {
            if let Some(owner) = tables.reference_owner(transaction.payment_reference.as_ref()) {
                if owner != transaction.id {
                    return Err(StoreError::Duplicate(format!(
                        "payment reference already used by {owner}"
                    )));
                }
            }
            if let Some(old) = previous_reference {
                tables.by_reference.remove(&old);
            }
            if let Some(new) = &transaction.payment_reference {
                tables.by_reference.insert(new.clone(), transaction.id);
            }
        }

        tables.transactions.insert(transaction.id, transaction.clone());
        Ok(())
    }

    fn find_transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        let tables = self.read();
        Ok(tables
            .by_reference
            .get(reference)
            .and_then(|id| tables.transactions.get(id))
            .cloned())
    }

    fn list_transactions_by_wallet(
        &self,
        wallet_address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let tables = self.read();
        let Some(ids) = tables.by_wallet.get(wallet_address) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| tables.transactions.get(id).cloned())
            .collect())
    }

    fn put_session(&self, session: &PaymentSession) -> Result<()> {
        self.write()
            .sessions
            .insert(session.transaction_id, session.clone());
        Ok(())
    }

    fn get_session_for_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentSession>> {
        Ok(self.read().sessions.get(transaction_id).cloned())
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<PaymentSession>> {
        let mut tables = self.write();
        let expired: Vec<TransactionId> = tables
            .sessions
            .values()
            .filter(|s| s.is_expired_at(now))
            .map(|s| s.transaction_id)
            .collect();

        Ok(expired
            .iter()
            .filter_map(|id| tables.sessions.remove(id))
            .collect())
    }

    fn put_rate(&self, rate: &CryptoRate) -> Result<()> {
        self.write().rates.insert(rate.symbol, *rate);
        Ok(())
    }

    fn list_rates(&self) -> Result<Vec<CryptoRate>> {
        Ok(self.read().rates.values().copied().collect())
    }
}
