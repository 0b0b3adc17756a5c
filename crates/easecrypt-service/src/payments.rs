//! Accepting and rejecting payments.
//!
//! Manual confirmation and gateway callbacks share this path: the payment
//! session must still be open, the transaction moves `pending -> paid`, the
//! session closes and the transfer is queued.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

use easecrypt_core::{
    CoreError, NewTransaction, PaymentProvider, PaymentSession, PaymentStatus, Transaction,
    TransactionId, TransactionMetadata, TransactionUpdate, VirtualAccount,
};

use crate::ledger::{Ledger, LedgerError};
use crate::sessions::{SessionError, SessionManager};
use crate::transfer::TransferQueue;

/// Reference a buyer quotes when paying: `TXN-{millis}-{6 alphanumerics}`.
#[must_use]
pub fn generate_payment_reference(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("TXN-{}-{suffix}", now.timestamp_millis())
}

/// Reference recorded for an operator confirmation.
#[must_use]
pub fn manual_confirmation_reference(now: DateTime<Utc>) -> String {
    format!("REF-{}", now.timestamp_millis())
}

/// Payment errors.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Ledger refused or failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Session missing, closed or expired.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Drives transactions through payment.
#[derive(Clone)]
pub struct Payments {
    ledger: Ledger,
    sessions: SessionManager,
    transfers: TransferQueue,
}

impl Payments {
    /// Create the payment path.
    #[must_use]
    pub fn new(ledger: Ledger, sessions: SessionManager, transfers: TransferQueue) -> Self {
        Self {
            ledger,
            sessions,
            transfers,
        }
    }

    /// Record a transaction and open the session it is paid through.
    ///
    /// If the session cannot be stored the transaction is failed with
    /// `SessionUnavailable`, since nothing would ever expire it.
    pub fn open(
        &self,
        new: NewTransaction,
        account: VirtualAccount,
    ) -> Result<(Transaction, PaymentSession), PaymentError> {
        let transaction = self.ledger.create(new)?;

        match self.sessions.create(transaction.id, account) {
            Ok(session) => Ok((transaction, session)),
            Err(e) => {
                tracing::error!(transaction_id = %transaction.id, error = %e, "Could not open payment session");
                let update = TransactionUpdate::status(PaymentStatus::Failed)
                    .only_from(PaymentStatus::Pending)
                    .with_metadata(TransactionMetadata::SessionUnavailable {
                        reason: e.to_string(),
                    });
                if let Err(e) = self.ledger.update(&transaction.id, &update) {
                    tracing::error!(transaction_id = %transaction.id, error = %e, "Could not fail transaction without session");
                }
                Err(e.into())
            }
        }
    }

    /// Record that the buyer paid and schedule delivery.
    ///
    /// A transaction whose session expired is failed with `SessionExpired`
    /// and the expiry is returned as the error.
    pub async fn accept(
        &self,
        transaction_id: &TransactionId,
        metadata: TransactionMetadata,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        let current = self.ledger.get(transaction_id)?;
        if current.payment_status != PaymentStatus::Pending {
            return Err(LedgerError::Core(CoreError::UnexpectedStatus {
                id: current.id,
                expected: PaymentStatus::Pending,
                actual: current.payment_status,
            })
            .into());
        }

        if let Err(e) = self.sessions.active_for(transaction_id, now) {
            if let SessionError::Expired { expires_at, .. } = &e {
                self.expire(transaction_id, *expires_at);
            }
            return Err(e.into());
        }

        let update = TransactionUpdate::status(PaymentStatus::Paid)
            .only_from(PaymentStatus::Pending)
            .with_metadata(metadata);
        let paid = self.ledger.update(transaction_id, &update)?;

        if let Err(e) = self.sessions.complete(transaction_id) {
            tracing::warn!(transaction_id = %transaction_id, error = %e, "Could not close payment session");
        }

        tracing::info!(
            transaction_id = %transaction_id,
            token_symbol = %paid.token_symbol,
            total_cost_minor = paid.total_cost_minor,
            "Payment accepted"
        );
        self.transfers.enqueue(paid.id).await?;
        Ok(paid)
    }

    /// Fail a pending transaction because the gateway reported a bad payment.
    pub fn reject(
        &self,
        transaction_id: &TransactionId,
        provider: PaymentProvider,
        reason: String,
    ) -> Result<Transaction, PaymentError> {
        tracing::warn!(
            transaction_id = %transaction_id,
            provider = %provider,
            reason = %reason,
            "Payment rejected"
        );
        let update = TransactionUpdate::status(PaymentStatus::Failed)
            .only_from(PaymentStatus::Pending)
            .with_metadata(TransactionMetadata::PaymentRejected { provider, reason });
        let failed = self.ledger.update(transaction_id, &update)?;

        if let Err(e) = self.sessions.complete(transaction_id) {
            tracing::debug!(transaction_id = %transaction_id, error = %e, "No session to close");
        }
        Ok(failed)
    }

    fn expire(&self, transaction_id: &TransactionId, expired_at: DateTime<Utc>) {
        let update = TransactionUpdate::status(PaymentStatus::Failed)
            .only_from(PaymentStatus::Pending)
            .with_metadata(TransactionMetadata::SessionExpired { expired_at });
        match self.ledger.update(transaction_id, &update) {
            Ok(_) => tracing::info!(transaction_id = %transaction_id, "Payment arrived after session expiry"),
            Err(e) => tracing::warn!(transaction_id = %transaction_id, error = %e, "Could not expire transaction"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::new_transaction;
    use easecrypt_core::CryptoRate;
    use easecrypt_store::{InMemoryStore, Result as StoreResult, Store, StoreError};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    use crate::transfer::TransferJob;

    struct Fixture {
        payments: Payments,
        ledger: Ledger,
        sessions: SessionManager,
        jobs: mpsc::Receiver<TransferJob>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Ledger::new(store.clone());
        let sessions = SessionManager::new(
            store,
            chrono::Duration::minutes(10),
            "Providus Bank",
            "EaseCrypt Payments",
        );
        let (queue, jobs) = TransferQueue::channel(4, ledger.clone());
        Fixture {
            payments: Payments::new(ledger.clone(), sessions.clone(), queue),
            ledger,
            sessions,
            jobs,
        }
    }

    fn open(f: &Fixture, reference: &str) -> Transaction {
        let tx = f.ledger.create(new_transaction(reference)).unwrap();
        f.sessions
            .create(tx.id, f.sessions.virtual_account(reference, tx.total_cost_minor))
            .unwrap();
        tx
    }

    fn manual() -> TransactionMetadata {
        TransactionMetadata::ManualConfirmation {
            reference: "REF-1".into(),
        }
    }

    /// Stores everything except sessions.
    struct NoSessionStore(InMemoryStore);

    impl Store for NoSessionStore {
        fn insert_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
            self.0.insert_transaction(transaction)
        }
        fn get_transaction(&self, id: &TransactionId) -> StoreResult<Option<Transaction>> {
            self.0.get_transaction(id)
        }
        fn compare_and_put_transaction(
            &self,
            expected_updated_at: DateTime<Utc>,
            transaction: &Transaction,
        ) -> StoreResult<()> {
            self.0.compare_and_put_transaction(expected_updated_at, transaction)
        }
        fn find_transaction_by_reference(&self, reference: &str) -> StoreResult<Option<Transaction>> {
            self.0.find_transaction_by_reference(reference)
        }
        fn list_transactions_by_wallet(
            &self,
            wallet_address: &str,
            limit: usize,
            offset: usize,
        ) -> StoreResult<Vec<Transaction>> {
            self.0.list_transactions_by_wallet(wallet_address, limit, offset)
        }
        fn put_session(&self, _: &PaymentSession) -> StoreResult<()> {
            Err(StoreError::Database("sessions column family missing".into()))
        }
        fn get_session_for_transaction(&self, id: &TransactionId) -> StoreResult<Option<PaymentSession>> {
            self.0.get_session_for_transaction(id)
        }
        fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<Vec<PaymentSession>> {
            self.0.delete_expired_sessions(now)
        }
        fn put_rate(&self, rate: &CryptoRate) -> StoreResult<()> {
            self.0.put_rate(rate)
        }
        fn list_rates(&self) -> StoreResult<Vec<CryptoRate>> {
            self.0.list_rates()
        }
    }

    #[test]
    fn open_records_transaction_and_session() {
        let f = fixture();
        let account = f.sessions.virtual_account("TXN-1", 1_015_000);
        let (tx, session) = f.payments.open(new_transaction("TXN-1"), account).unwrap();

        assert_eq!(tx.payment_status, PaymentStatus::Pending);
        assert_eq!(session.transaction_id, tx.id);
        assert!(f.sessions.get(&tx.id).unwrap().is_some());
    }

    #[test]
    fn open_fails_transaction_when_session_cannot_be_stored() {
        let store = Arc::new(NoSessionStore(InMemoryStore::new()));
        let ledger = Ledger::new(store.clone());
        let sessions = SessionManager::new(
            store,
            chrono::Duration::minutes(10),
            "Providus Bank",
            "EaseCrypt Payments",
        );
        let (queue, _jobs) = TransferQueue::channel(4, ledger.clone());
        let payments = Payments::new(ledger.clone(), sessions.clone(), queue);

        let account = sessions.virtual_account("TXN-1", 1_015_000);
        let err = payments.open(new_transaction("TXN-1"), account).unwrap_err();
        assert!(matches!(err, PaymentError::Session(SessionError::Store(_))));

        let tx = ledger.find_by_reference("TXN-1").unwrap().unwrap();
        assert_eq!(tx.payment_status, PaymentStatus::Failed);
        assert!(matches!(
            tx.metadata,
            Some(TransactionMetadata::SessionUnavailable { .. })
        ));
        assert!(tx
            .failure_reason()
            .unwrap()
            .starts_with("payment session unavailable"));
    }

    #[test]
    fn payment_reference_shape() {
        let now = Utc::now();
        let reference = generate_payment_reference(now);
        let parts: Vec<_> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn accept_marks_paid_and_queues_transfer() {
        let mut f = fixture();
        let tx = open(&f, "TXN-1");

        let paid = f.payments.accept(&tx.id, manual(), Utc::now()).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.payment_reference.as_deref(), Some("TXN-1"));
        assert_eq!(f.jobs.recv().await.unwrap().transaction_id, tx.id);
        assert!(!f.sessions.get(&tx.id).unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn accepting_twice_conflicts() {
        let f = fixture();
        let tx = open(&f, "TXN-1");
        f.payments.accept(&tx.id, manual(), Utc::now()).await.unwrap();

        let err = f.payments.accept(&tx.id, manual(), Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Ledger(LedgerError::Core(CoreError::UnexpectedStatus { .. }))
        ));
    }

    #[tokio::test]
    async fn late_payment_fails_the_transaction() {
        let f = fixture();
        let tx = open(&f, "TXN-1");

        let later = Utc::now() + chrono::Duration::minutes(11);
        let err = f.payments.accept(&tx.id, manual(), later).await.unwrap_err();
        assert!(matches!(err, PaymentError::Session(SessionError::Expired { .. })));

        let tx = f.ledger.get(&tx.id).unwrap();
        assert_eq!(tx.payment_status, PaymentStatus::Failed);
        assert!(matches!(tx.metadata, Some(TransactionMetadata::SessionExpired { .. })));
    }

    #[tokio::test]
    async fn reject_records_reason() {
        let f = fixture();
        let tx = open(&f, "TXN-1");

        let failed = f
            .payments
            .reject(&tx.id, PaymentProvider::Paystack, "underpaid".into())
            .unwrap();
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
        assert_eq!(failed.failure_reason().as_deref(), Some("payment rejected: underpaid"));
    }
}
