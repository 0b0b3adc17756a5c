//! Transfer trigger: a bounded queue of paid transactions and the worker
//! that settles them on-chain.
//!
//! The worker runs every job on its own task so a slow chain never holds up
//! the queue. When every [`TransferQueue`] handle is dropped the channel
//! closes and [`TransferWorker::run`] returns once in-flight jobs finish.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use easecrypt_core::{PaymentStatus, TransactionId, TransactionMetadata, TransactionUpdate};

use crate::chain::{TransferExecutor, TransferRequest};
use crate::ledger::{Ledger, LedgerError};

/// Jobs that may wait for the worker before `enqueue` applies backpressure.
pub const TRANSFER_QUEUE_CAPACITY: usize = 256;

/// A paid transaction awaiting delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferJob {
    /// Transaction to settle.
    pub transaction_id: TransactionId,
}

/// Sending half of the transfer queue.
#[derive(Clone)]
pub struct TransferQueue {
    sender: mpsc::Sender<TransferJob>,
    ledger: Ledger,
}

impl TransferQueue {
    /// Create a queue and its receiving half.
    #[must_use]
    pub fn channel(capacity: usize, ledger: Ledger) -> (Self, mpsc::Receiver<TransferJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, ledger }, receiver)
    }

    /// Schedule delivery of a paid transaction.
    ///
    /// If the worker is gone the transaction is failed on the spot, so it
    /// never sits in `paid` with nobody to settle it.
    pub async fn enqueue(&self, transaction_id: TransactionId) -> Result<(), LedgerError> {
        if self.sender.send(TransferJob { transaction_id }).await.is_ok() {
            tracing::debug!(transaction_id = %transaction_id, "Transfer queued");
            return Ok(());
        }

        tracing::error!(transaction_id = %transaction_id, "Transfer queue closed, failing transaction");
        let update = TransactionUpdate::status(PaymentStatus::Failed)
            .only_from(PaymentStatus::Paid)
            .with_metadata(TransactionMetadata::TransferFailed {
                reason: "transfer worker unavailable".into(),
                attempted_at: Utc::now(),
            });
        self.ledger.update(&transaction_id, &update)?;
        Ok(())
    }
}

/// Consumes the transfer queue.
pub struct TransferWorker {
    receiver: mpsc::Receiver<TransferJob>,
    executor: Arc<dyn TransferExecutor>,
    ledger: Ledger,
}

impl TransferWorker {
    /// Create a worker.
    #[must_use]
    pub fn new(
        receiver: mpsc::Receiver<TransferJob>,
        executor: Arc<dyn TransferExecutor>,
        ledger: Ledger,
    ) -> Self {
        Self {
            receiver,
            executor,
            ledger,
        }
    }

    /// Spawn the worker loop.
    #[must_use]
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process jobs until the queue closes, then drain in-flight transfers.
    pub async fn run(mut self) {
        tracing::info!(executor = self.executor.name(), "Transfer worker started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                job = self.receiver.recv() => {
                    let Some(job) = job else { break };
                    let executor = Arc::clone(&self.executor);
                    let ledger = self.ledger.clone();
                    in_flight.spawn(settle(executor, ledger, job.transaction_id));
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
            }
        }

        if !in_flight.is_empty() {
            tracing::info!(in_flight = in_flight.len(), "Transfer queue closed, draining");
        }
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        tracing::info!("Transfer worker stopped");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Transfer task panicked");
    }
}

/// Deliver one transaction and record the outcome.
async fn settle(executor: Arc<dyn TransferExecutor>, ledger: Ledger, transaction_id: TransactionId) {
    let transaction = match ledger.get(&transaction_id) {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!(transaction_id = %transaction_id, error = %e, "Cannot load transaction for transfer");
            return;
        }
    };
    if transaction.payment_status != PaymentStatus::Paid {
        tracing::warn!(
            transaction_id = %transaction_id,
            status = %transaction.payment_status,
            "Skipping transfer of transaction that is not paid"
        );
        return;
    }

    let request = TransferRequest::for_transaction(&transaction);
    tracing::info!(
        transaction_id = %transaction_id,
        token_symbol = %request.token_symbol,
        amount = %request.amount,
        executor = executor.name(),
        "Executing transfer"
    );

    let update = match executor.transfer(&request).await {
        Ok(hash) => {
            tracing::info!(transaction_id = %transaction_id, transaction_hash = %hash, "Transfer confirmed");
            TransactionUpdate::status(PaymentStatus::Confirmed)
                .only_from(PaymentStatus::Paid)
                .with_hash(hash)
        }
        Err(e) => {
            tracing::error!(transaction_id = %transaction_id, error = %e, "Transfer failed");
            TransactionUpdate::status(PaymentStatus::Failed)
                .only_from(PaymentStatus::Paid)
                .with_metadata(TransactionMetadata::TransferFailed {
                    reason: e.to_string(),
                    attempted_at: Utc::now(),
                })
        }
    };

    if let Err(e) = ledger.update(&transaction_id, &update) {
        tracing::error!(transaction_id = %transaction_id, error = %e, "Could not record transfer outcome");
    }
}
