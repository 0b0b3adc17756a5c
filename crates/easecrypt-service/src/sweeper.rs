//! Periodic housekeeping: rate cache purge and payment session expiry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use easecrypt_core::{PaymentStatus, RateCache, TransactionMetadata, TransactionUpdate};

use crate::ledger::{Ledger, LedgerError};
use crate::sessions::SessionManager;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rate cache entries dropped.
    pub purged_rates: usize,
    /// Sessions removed.
    pub expired_sessions: usize,
    /// Pending transactions failed because their session expired.
    pub failed_transactions: usize,
}

/// Background sweeper.
pub struct Sweeper {
    rates: Arc<RateCache>,
    sessions: SessionManager,
    ledger: Ledger,
    period: Duration,
}

impl Sweeper {
    /// Create a sweeper that runs every `period`.
    #[must_use]
    pub fn new(rates: Arc<RateCache>, sessions: SessionManager, ledger: Ledger, period: Duration) -> Self {
        Self {
            rates,
            sessions,
            ledger,
            period,
        }
    }

    /// Spawn the sweep loop; it stops when `shutdown` flips to `true` or its
    /// sender is dropped.
    #[must_use]
    pub fn start(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(period_seconds = self.period.as_secs(), "Sweeper started");
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep_at(Utc::now());
                    if report != SweepReport::default() {
                        tracing::debug!(
                            purged_rates = report.purged_rates,
                            expired_sessions = report.expired_sessions,
                            failed_transactions = report.failed_transactions,
                            "Sweep finished"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Sweeper stopped");
    }

    /// Run one sweep as of `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport {
            purged_rates: self.rates.purge_expired_at(now),
            ..SweepReport::default()
        };

        let expired = match self.sessions.cleanup_expired(now) {
            Ok(expired) => expired,
            Err(e) => {
                tracing::error!(error = %e, "Session cleanup failed");
                return report;
            }
        };
        report.expired_sessions = expired.len();

        for session in expired {
            let update = TransactionUpdate::status(PaymentStatus::Failed)
                .only_from(PaymentStatus::Pending)
                .with_metadata(TransactionMetadata::SessionExpired {
                    expired_at: session.expires_at,
                });

            match self.ledger.update(&session.transaction_id, &update) {
                Ok(_) => {
                    tracing::info!(
                        transaction_id = %session.transaction_id,
                        expired_at = %session.expires_at,
                        "Unpaid transaction expired"
                    );
                    report.failed_transactions += 1;
                }
                // Paid in time, or already settled.
                Err(LedgerError::Core(_)) => {}
                Err(e) => tracing::error!(
                    transaction_id = %session.transaction_id,
                    error = %e,
                    "Could not expire transaction"
                ),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::new_transaction;
    use easecrypt_core::{CryptoRate, TokenSymbol};
    use easecrypt_store::InMemoryStore;

    struct Fixture {
        sweeper: Sweeper,
        ledger: Ledger,
        sessions: SessionManager,
        rates: Arc<RateCache>,
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
        let rates = Arc::new(RateCache::default());
        let sweeper = Sweeper::new(
            rates.clone(),
            sessions.clone(),
            ledger.clone(),
            Duration::from_secs(60),
        );
        Fixture {
            sweeper,
            ledger,
            sessions,
            rates,
        }
    }

    #[test]
    fn expired_sessions_fail_pending_transactions() {
        let f = fixture();
        let unpaid = f.ledger.create(new_transaction("TXN-1")).unwrap();
        let paid = f.ledger.create(new_transaction("TXN-2")).unwrap();
        for tx in [&unpaid, &paid] {
            f.sessions
                .create(tx.id, f.sessions.virtual_account("R", tx.total_cost_minor))
                .unwrap();
        }
        f.ledger
            .update(&paid.id, &TransactionUpdate::status(PaymentStatus::Paid))
            .unwrap();

        let report = f.sweeper.sweep_at(Utc::now() + chrono::Duration::minutes(11));
        assert_eq!(report.expired_sessions, 2);
        assert_eq!(report.failed_transactions, 1);

        let unpaid = f.ledger.get(&unpaid.id).unwrap();
        assert_eq!(unpaid.payment_status, PaymentStatus::Failed);
        assert!(matches!(unpaid.metadata, Some(TransactionMetadata::SessionExpired { .. })));
        assert_eq!(f.ledger.get(&paid.id).unwrap().payment_status, PaymentStatus::Paid);
        assert!(f.sessions.get(&unpaid.id).unwrap().is_none());
    }

    #[test]
    fn live_sessions_survive() {
        let f = fixture();
        let tx = f.ledger.create(new_transaction("TXN-1")).unwrap();
        f.sessions.create(tx.id, f.sessions.virtual_account("R", 1)).unwrap();

        assert_eq!(f.sweeper.sweep_at(Utc::now()), SweepReport::default());
        assert_eq!(f.ledger.get(&tx.id).unwrap().payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn stale_rates_are_purged() {
        let f = fixture();
        f.rates
            .set_current(CryptoRate::new(TokenSymbol::Btc, 1).unwrap());

        let report = f.sweeper.sweep_at(Utc::now() + chrono::Duration::hours(2));
        assert!(report.purged_rates > 0);
        assert!(f.rates.is_empty());
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let f = fixture();
        let (tx, rx) = watch::channel(false);
        let handle = f.sweeper.start(rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
