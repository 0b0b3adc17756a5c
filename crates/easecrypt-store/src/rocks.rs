//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use easecrypt_core::{CryptoRate, PaymentSession, Transaction, TransactionId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    // Serializes read-check-write cycles; plain reads never take it.
    write_lock: Mutex<()>,
}

fn db_err(e: rocksdb::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_cbor<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn reference_owner(&self, reference: &str) -> Result<Option<TransactionId>> {
        let cf = self.cf(cf::TRANSACTIONS_BY_REFERENCE)?;
        let Some(raw) = self
            .db
            .get_cf(&cf, keys::reference_key(reference))
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization(format!("corrupt reference index for {reference}")))?;
        Ok(Some(TransactionId::from_bytes(bytes)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Transaction Operations
    // =========================================================================

    fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let _guard = self.lock();

        if self.get_transaction(&transaction.id)?.is_some() {
            return Err(StoreError::Duplicate(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }
        if let Some(reference) = &transaction.payment_reference {
            if let Some(owner) = self.reference_owner(reference)? {
                return Err(StoreError::Duplicate(format!(
                    "payment reference already used by {owner}"
                )));
            }
        }

        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_wallet = self.cf(cf::TRANSACTIONS_BY_WALLET)?;
        let cf_by_reference = self.cf(cf::TRANSACTIONS_BY_REFERENCE)?;

        let tx_key = keys::transaction_key(&transaction.id);
        let wallet_key = keys::wallet_transaction_key(&transaction.wallet_address, &transaction.id);
        let value = Self::serialize(transaction)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_tx, &tx_key, &value);
        batch.put_cf(&cf_by_wallet, &wallet_key, []); // Index entry (empty value)
        if let Some(reference) = &transaction.payment_reference {
            batch.put_cf(&cf_by_reference, keys::reference_key(reference), &tx_key);
        }

        self.db.write(batch).map_err(db_err)?;
        Ok(())
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        self.get_cbor(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn compare_and_put_transaction(
        &self,
        expected_updated_at: DateTime<Utc>,
        transaction: &Transaction,
    ) -> Result<()> {
        let _guard = self.lock();

        let stored = self
            .get_transaction(&transaction.id)?
            .ok_or(StoreError::NotFound)?;
        if stored.updated_at != expected_updated_at {
            return Err(StoreError::Conflict(format!(
                "transaction {} was modified concurrently",
                transaction.id
            )));
        }

        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_reference = self.cf(cf::TRANSACTIONS_BY_REFERENCE)?;
        let tx_key = keys::transaction_key(&transaction.id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_tx, &tx_key, Self::serialize(transaction)?);

        if stored.payment_reference != transaction.payment_reference {
            if let Some(new) = &transaction.payment_reference {
                match self.reference_owner(new)? {
                    Some(owner) if owner != transaction.id => {
                        return Err(StoreError::Duplicate(format!(
                            "payment reference already used by {owner}"
                        )));
                    }
                    _ => batch.put_cf(&cf_by_reference, keys::reference_key(new), &tx_key),
                }
            }
            if let Some(old) = &stored.payment_reference {
                batch.delete_cf(&cf_by_reference, keys::reference_key(old));
            }
        }

        self.db.write(batch).map_err(db_err)?;
        Ok(())
    }

    fn find_transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        match self.reference_owner(reference)? {
            Some(id) => self.get_transaction(&id),
            None => Ok(None),
        }
    }

    fn list_transactions_by_wallet(
        &self,
        wallet_address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let cf_by_wallet = self.cf(cf::TRANSACTIONS_BY_WALLET)?;
        let prefix = keys::wallet_transactions_prefix(wallet_address);

        // Collect the wallet's index keys (ascending ULID order), then walk
        // them backwards for newest first.
        let mut all_keys: Vec<Box<[u8]>> = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_by_wallet, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(db_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key);
        }

        let mut transactions = Vec::new();
        for key in all_keys.iter().rev().skip(offset) {
            if transactions.len() >= limit {
                break;
            }
            let Some(tx_id) = keys::extract_transaction_id_from_wallet_key(key) else {
                tracing::warn!(wallet = %wallet_address, "skipping malformed wallet index key");
                continue;
            };
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    // =========================================================================
    // Payment Session Operations
    // =========================================================================

    fn put_session(&self, session: &PaymentSession) -> Result<()> {
        let cf = self.cf(cf::PAYMENT_SESSIONS)?;
        let value = Self::serialize(session)?;
        self.db
            .put_cf(&cf, keys::session_key(&session.transaction_id), value)
            .map_err(db_err)
    }

    fn get_session_for_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentSession>> {
        self.get_cbor(cf::PAYMENT_SESSIONS, &keys::session_key(transaction_id))
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<PaymentSession>> {
        let _guard = self.lock();
        let cf = self.cf(cf::PAYMENT_SESSIONS)?;

        let mut expired = Vec::new();
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(db_err)?;
            let session: PaymentSession = Self::deserialize(&value)?;
            if session.is_expired_at(now) {
                batch.delete_cf(&cf, key);
                expired.push(session);
            }
        }

        if !expired.is_empty() {
            self.db.write(batch).map_err(db_err)?;
        }
        Ok(expired)
    }

    // =========================================================================
    // Rate Operations
    // =========================================================================

    fn put_rate(&self, rate: &CryptoRate) -> Result<()> {
        let cf = self.cf(cf::RATES)?;
        let value = Self::serialize(rate)?;
        self.db
            .put_cf(&cf, keys::rate_key(rate.symbol), value)
            .map_err(db_err)
    }

    fn list_rates(&self) -> Result<Vec<CryptoRate>> {
        let cf = self.cf(cf::RATES)?;
        self.db
            .iterator_cf(&cf, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(db_err)?;
                Self::deserialize(&value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn transaction_roundtrip() {
        let (store, _dir) = create_test_store();
        conformance::transaction_roundtrip(&store);
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let (store, _dir) = create_test_store();
        conformance::duplicate_insert_conflicts(&store);
    }

    #[test]
    fn compare_and_put_detects_races() {
        let (store, _dir) = create_test_store();
        conformance::compare_and_put_detects_races(&store);
    }

    #[test]
    fn reference_index_follows_updates() {
        let (store, _dir) = create_test_store();
        conformance::reference_index_follows_updates(&store);
    }

    #[test]
    fn wallet_history_is_newest_first() {
        let (store, _dir) = create_test_store();
        conformance::wallet_history_is_newest_first(&store);
    }

    #[test]
    fn sessions_expire() {
        let (store, _dir) = create_test_store();
        conformance::sessions_expire(&store);
    }

    #[test]
    fn rates_are_last_write_wins() {
        let (store, _dir) = create_test_store();
        conformance::rates_are_last_write_wins(&store);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let tx = conformance::transaction(conformance::WALLET_A, "TXN-1");
        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.insert_transaction(&tx).unwrap();
        }
        let store = RocksStore::open(dir.path()).unwrap();
        assert_eq!(store.get_transaction(&tx.id).unwrap(), Some(tx.clone()));
        assert_eq!(
            store.find_transaction_by_reference("TXN-1").unwrap().map(|t| t.id),
            Some(tx.id)
        );
    }
}
