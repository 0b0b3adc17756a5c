//! Payment sessions: the window during which a buyer may pay.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, TransactionId};

/// Default lifetime of a payment session (10 minutes).
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 600;

/// Currency every virtual account is denominated in.
pub const SETTLEMENT_CURRENCY: &str = "NGN";

/// Bank account details the buyer pays into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualAccount {
    /// 10-digit NUBAN account number.
    pub account_number: String,
    /// Bank holding the account.
    pub bank_name: String,
    /// Name displayed to the payer.
    pub account_name: String,
    /// Exact amount expected, in kobo.
    pub amount_minor: i64,
    /// ISO currency code.
    pub currency: String,
    /// Reference the payer should quote.
    pub reference: String,
}

/// A time-bounded window for paying one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Session id.
    pub id: SessionId,
    /// Transaction being paid for.
    pub transaction_id: TransactionId,
    /// Where to pay.
    pub session_data: VirtualAccount,
    /// End of the payment window.
    pub expires_at: DateTime<Utc>,
    /// Cleared once the payment lands or the session is swept.
    pub is_active: bool,
    /// Opening time.
    pub created_at: DateTime<Utc>,
}

impl PaymentSession {
    /// Open a session for `transaction_id` that lasts `ttl` from `now`.
    #[must_use]
    pub fn open(
        transaction_id: TransactionId,
        account: VirtualAccount,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            transaction_id,
            session_data: account,
            expires_at: now + ttl,
            is_active: true,
            created_at: now,
        }
    }

    /// Whether the payment window has closed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the session still accepts payment at `now`.
    #[must_use]
    pub fn accepts_payment_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}
