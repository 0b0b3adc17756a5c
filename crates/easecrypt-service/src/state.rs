//! Application state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use easecrypt_core::{FeeSchedule, RateCache};
use easecrypt_store::Store;

use crate::config::ServiceConfig;
use crate::feed::PriceFeed;
use crate::ledger::Ledger;
use crate::payments::Payments;
use crate::rates::RateService;
use crate::sessions::SessionManager;
use crate::sweeper::Sweeper;
use crate::transfer::{TransferJob, TransferQueue, TRANSFER_QUEUE_CAPACITY};

/// Application state shared across handlers.
///
/// Holds the sending half of the transfer queue: once the router owning the
/// state is dropped, the transfer worker sees the queue close.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,

    /// Transaction ledger.
    pub ledger: Ledger,

    /// Payment sessions.
    pub sessions: SessionManager,

    /// Rates for quoting.
    pub rates: RateService,

    /// Payment acceptance path.
    pub payments: Payments,
}

impl AppState {
    /// Wire the services over `store` and `feed`.
    ///
    /// Returns the receiving half of the transfer queue for the worker.
    #[must_use]
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn Store>,
        feed: Arc<dyn PriceFeed>,
    ) -> (Self, mpsc::Receiver<TransferJob>) {
        let ledger = Ledger::new(store.clone());
        let sessions = SessionManager::new(
            store.clone(),
            chrono::Duration::seconds(config.session_ttl_seconds),
            config.bank_name.clone(),
            config.account_name.clone(),
        );

        let rates = RateService::new(Arc::new(RateCache::default()), feed, store);
        rates.warm(&config.seed_rates);

        let (transfers, jobs) = TransferQueue::channel(TRANSFER_QUEUE_CAPACITY, ledger.clone());
        let payments = Payments::new(ledger.clone(), sessions.clone(), transfers);

        if config.webhook_secret().is_none() {
            if config.environment.is_production() {
                tracing::warn!(
                    provider = %config.payment_provider,
                    "Webhook secret not configured - payment webhooks will be refused"
                );
            } else {
                tracing::warn!(
                    provider = %config.payment_provider,
                    "Webhook secret not configured - signatures will not be verified"
                );
            }
        }

        let state = Self {
            config,
            ledger,
            sessions,
            rates,
            payments,
        };
        (state, jobs)
    }

    /// Fees applied to quotes.
    #[must_use]
    pub fn fees(&self) -> &FeeSchedule {
        &self.config.fees
    }

    /// The housekeeping task for this state.
    #[must_use]
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.rates.cache_handle(),
            self.sessions.clone(),
            self.ledger.clone(),
            Duration::from_secs(self.config.sweep_interval_seconds.max(1)),
        )
    }
}
