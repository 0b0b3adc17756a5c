//! Storage layer for the EaseCrypt on-ramp.
//!
//! Two backends implement [`Store`]:
//!
//! - [`InMemoryStore`]: process-local maps, always available
//! - `RocksStore`: persistent, behind the `rocksdb-backend` feature
//!
//! # Column families (`RocksDB`)
//!
//! - `transactions`: transaction records, keyed by `transaction_id` (ULID)
//! - `transactions_by_wallet`: index for listing a wallet's history
//! - `transactions_by_reference`: payment reference to `transaction_id`
//! - `payment_sessions`: sessions keyed by the transaction they belong to
//! - `rates`: last observed rate per token
//!
//! # Example
//!
//! ```no_run
//! use easecrypt_store::{InMemoryStore, Store};
//! use easecrypt_core::TransactionId;
//!
//! let store = InMemoryStore::new();
//! let missing = store.get_transaction(&TransactionId::generate()).unwrap();
//! assert!(missing.is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use easecrypt_core::{CryptoRate, PaymentSession, Transaction, TransactionId};

/// The storage trait defining all database operations.
///
/// Implementations must make each method atomic with respect to the others;
/// callers build read-modify-write cycles on top of
/// [`Store::compare_and_put_transaction`].
pub trait Store: Send + Sync {
    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Insert a new transaction and its indexes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id or payment reference is taken.
    fn insert_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>>;

    /// Replace a transaction only if the stored copy still has
    /// `expected_updated_at`.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the transaction doesn't exist.
    /// - `StoreError::Conflict` if another writer got there first.
    /// - `StoreError::Duplicate` if the new payment reference belongs to a
    ///   different transaction.
    fn compare_and_put_transaction(
        &self,
        expected_updated_at: DateTime<Utc>,
        transaction: &Transaction,
    ) -> Result<()>;

    /// Find the transaction a payment reference was issued for.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>>;

    /// List transactions for a wallet, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_wallet(
        &self,
        wallet_address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    // =========================================================================
    // Payment Session Operations
    // =========================================================================

    /// Insert or replace the session of a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_session(&self, session: &PaymentSession) -> Result<()>;

    /// Get the session belonging to a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_session_for_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentSession>>;

    /// Remove every session whose deadline is before `now` and return them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<PaymentSession>>;

    // =========================================================================
    // Rate Operations
    // =========================================================================

    /// Record the latest observed rate for a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_rate(&self, rate: &CryptoRate) -> Result<()>;

    /// Every recorded rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_rates(&self) -> Result<Vec<CryptoRate>>;
}

/// Behaviour every backend must share, run against each implementation.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use chrono::Duration;
    use easecrypt_core::{
        NewTransaction, PaymentStatus, TokenSymbol, TransactionUpdate, VirtualAccount,
    };

    pub const WALLET_A: &str = "0x04a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f";
    pub const WALLET_B: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    pub fn transaction(wallet: &str, reference: &str) -> Transaction {
        let new = NewTransaction {
            token_symbol: TokenSymbol::Usdc,
            amount_minor: 1_000_000,
            crypto_amount: "6060606".into(),
            wallet_address: wallet.into(),
            email: None,
            exchange_rate_minor: 165_000,
            service_fee_minor: 10_000,
            network_fee_minor: 5_000,
            total_cost_minor: 1_015_000,
            payment_reference: Some(reference.into()),
            virtual_account_number: Some("0123456789".into()),
        };
        Transaction::create(new, Utc::now()).unwrap()
    }

    fn session(tx: &Transaction, expires_in: Duration) -> PaymentSession {
        let account = VirtualAccount {
            account_number: "0123456789".into(),
            bank_name: "Providus Bank".into(),
            account_name: "EaseCrypt Payments".into(),
            amount_minor: tx.total_cost_minor,
            currency: "NGN".into(),
            reference: tx.payment_reference.clone().unwrap_or_default(),
        };
        PaymentSession::open(tx.id, account, expires_in, Utc::now())
    }

    pub fn transaction_roundtrip(store: &dyn Store) {
        let tx = transaction(WALLET_A, "TXN-1");
        store.insert_transaction(&tx).unwrap();

        assert_eq!(store.get_transaction(&tx.id).unwrap(), Some(tx.clone()));
        assert_eq!(
            store.find_transaction_by_reference("TXN-1").unwrap().map(|t| t.id),
            Some(tx.id)
        );
        assert!(store.find_transaction_by_reference("TXN-404").unwrap().is_none());
        assert!(store.get_transaction(&TransactionId::generate()).unwrap().is_none());
    }

    pub fn duplicate_insert_conflicts(store: &dyn Store) {
        let tx = transaction(WALLET_A, "TXN-1");
        store.insert_transaction(&tx).unwrap();
        assert!(matches!(store.insert_transaction(&tx), Err(StoreError::Duplicate(_))));

        let same_reference = transaction(WALLET_B, "TXN-1");
        assert!(matches!(
            store.insert_transaction(&same_reference),
            Err(StoreError::Duplicate(_))
        ));
        assert!(store.get_transaction(&same_reference.id).unwrap().is_none());
    }

    pub fn compare_and_put_detects_races(store: &dyn Store) {
        let tx = transaction(WALLET_A, "TXN-1");
        store.insert_transaction(&tx).unwrap();

        let mut first = tx.clone();
        first
            .apply(&TransactionUpdate::status(PaymentStatus::Paid), Utc::now())
            .unwrap();
        store.compare_and_put_transaction(tx.updated_at, &first).unwrap();

        let mut second = tx.clone();
        second
            .apply(&TransactionUpdate::status(PaymentStatus::Failed), Utc::now())
            .unwrap();
        assert!(matches!(
            store.compare_and_put_transaction(tx.updated_at, &second),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            store.get_transaction(&tx.id).unwrap().unwrap().payment_status,
            PaymentStatus::Paid
        );

        let unknown = transaction(WALLET_A, "TXN-2");
        assert!(matches!(
            store.compare_and_put_transaction(unknown.updated_at, &unknown),
            Err(StoreError::NotFound)
        ));
    }

    pub fn reference_index_follows_updates(store: &dyn Store) {
        let tx = transaction(WALLET_A, "TXN-1");
        store.insert_transaction(&tx).unwrap();

        let mut updated = tx.clone();
        updated
            .apply(&TransactionUpdate::default().with_reference("GW-77"), Utc::now())
            .unwrap();
        store.compare_and_put_transaction(tx.updated_at, &updated).unwrap();

        assert!(store.find_transaction_by_reference("TXN-1").unwrap().is_none());
        assert_eq!(
            store.find_transaction_by_reference("GW-77").unwrap().map(|t| t.id),
            Some(tx.id)
        );
    }

    pub fn wallet_history_is_newest_first(store: &dyn Store) {
        let mut ids = Vec::new();
        for i in 0..3 {
            let tx = transaction(WALLET_A, &format!("TXN-{i}"));
            store.insert_transaction(&tx).unwrap();
            ids.push(tx.id);
        }
        store.insert_transaction(&transaction(WALLET_B, "OTHER")).unwrap();

        let all = store.list_transactions_by_wallet(WALLET_A, 10, 0).unwrap();
        let listed: Vec<_> = all.iter().map(|t| t.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);

        let page = store.list_transactions_by_wallet(WALLET_A, 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[1]);

        assert!(store.list_transactions_by_wallet(WALLET_A, 10, 5).unwrap().is_empty());
    }

    pub fn sessions_expire(store: &dyn Store) {
        let live_tx = transaction(WALLET_A, "TXN-1");
        let dead_tx = transaction(WALLET_A, "TXN-2");
        let live = session(&live_tx, Duration::minutes(10));
        let dead = session(&dead_tx, Duration::seconds(-1));
        store.put_session(&live).unwrap();
        store.put_session(&dead).unwrap();

        let removed = store.delete_expired_sessions(Utc::now()).unwrap();
        assert_eq!(removed, vec![dead]);
        assert!(store.get_session_for_transaction(&dead_tx.id).unwrap().is_none());
        assert_eq!(store.get_session_for_transaction(&live_tx.id).unwrap(), Some(live.clone()));

        let mut completed = live;
        completed.is_active = false;
        store.put_session(&completed).unwrap();
        assert!(!store
            .get_session_for_transaction(&live_tx.id)
            .unwrap()
            .unwrap()
            .is_active);
    }

    pub fn rates_are_last_write_wins(store: &dyn Store) {
        store.put_rate(&CryptoRate::new(TokenSymbol::Btc, 1).unwrap()).unwrap();
        store.put_rate(&CryptoRate::new(TokenSymbol::Btc, 2).unwrap()).unwrap();
        store.put_rate(&CryptoRate::new(TokenSymbol::Eth, 3).unwrap()).unwrap();

        let mut rates = store.list_rates().unwrap();
        rates.sort_by_key(|r| r.symbol);
        let prices: Vec<_> = rates.iter().map(|r| (r.symbol, r.price_minor)).collect();
        assert_eq!(prices, vec![(TokenSymbol::Btc, 2), (TokenSymbol::Eth, 3)]);
    }
}
