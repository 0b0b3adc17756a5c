//! Transactions and their payment lifecycle.
//!
//! ```text
//! pending ──► paid ──► confirmed
//!    │          │
//!    └──► failed ◄┘
//! ```
//!
//! `confirmed` and `failed` are terminal. [`Transaction::apply`] enforces the
//! machine, so a transaction can only ever be observed moving forward.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::quote::Quote;
use crate::validation::{check_amount, check_email, check_wallet_address, Order, ValidationErrors};
use crate::{TokenSymbol, TransactionId};

/// Where a transaction is in its payment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Waiting for the buyer's bank transfer.
    Pending,
    /// Fiat received; on-chain transfer in flight.
    Paid,
    /// Tokens delivered.
    Confirmed,
    /// Abandoned, rejected or the transfer failed.
    Failed,
}

impl PaymentStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Failed) | (Self::Paid, Self::Confirmed | Self::Failed)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment gateway that issued a virtual account and reports payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// Flutterwave.
    Flutterwave,
    /// Paystack.
    Paystack,
}

impl PaymentProvider {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flutterwave => "flutterwave",
            Self::Paystack => "paystack",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flutterwave" => Ok(Self::Flutterwave),
            "paystack" => Ok(Self::Paystack),
            other => Err(format!("unknown payment provider: {other}")),
        }
    }
}

/// Provider- and failure-specific diagnostics attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionMetadata {
    /// Payment confirmed by an operator without a gateway callback.
    ManualConfirmation {
        /// Reference assigned at confirmation.
        reference: String,
    },
    /// Payment reported by a gateway webhook.
    GatewayPayment {
        /// Reporting gateway.
        provider: PaymentProvider,
        /// Gateway reference.
        reference: String,
        /// Amount the gateway says was paid, in kobo.
        amount_minor: i64,
    },
    /// Gateway reported a failed or insufficient payment.
    PaymentRejected {
        /// Reporting gateway.
        provider: PaymentProvider,
        /// Why the payment was not accepted.
        reason: String,
    },
    /// No payment session could be opened, so the buyer was never told
    /// where to pay.
    SessionUnavailable {
        /// Why the session was not stored.
        reason: String,
    },
    /// The payment window closed before money arrived.
    SessionExpired {
        /// When the session expired.
        expired_at: DateTime<Utc>,
    },
    /// The on-chain transfer could not be completed.
    TransferFailed {
        /// Executor's error.
        reason: String,
        /// When the transfer was attempted.
        attempted_at: DateTime<Utc>,
    },
}

impl TransactionMetadata {
    /// A short explanation when the metadata describes a failure.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::PaymentRejected { reason, .. } => Some(format!("payment rejected: {reason}")),
            Self::SessionUnavailable { reason } => {
                Some(format!("payment session unavailable: {reason}"))
            }
            Self::SessionExpired { .. } => Some("payment session expired".to_string()),
            Self::TransferFailed { reason, .. } => Some(format!("transfer failed: {reason}")),
            Self::ManualConfirmation { .. } | Self::GatewayPayment { .. } => None,
        }
    }
}

/// A purchase of tokens for fiat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique id (ULID, time-ordered).
    pub id: TransactionId,
    /// Token bought.
    pub token_symbol: TokenSymbol,
    /// Fiat amount in kobo, before fees.
    pub amount_minor: i64,
    /// Tokens owed, smallest unit, fixed at quote time.
    pub crypto_amount: String,
    /// Destination wallet.
    pub wallet_address: String,
    /// Buyer contact.
    pub email: Option<String>,
    /// Price of one token in kobo at quote time.
    pub exchange_rate_minor: i64,
    /// Service fee in kobo.
    pub service_fee_minor: i64,
    /// Network fee in kobo.
    pub network_fee_minor: i64,
    /// `amount + service_fee + network_fee`.
    pub total_cost_minor: i64,
    /// Lifecycle state.
    pub payment_status: PaymentStatus,
    /// Reference the payment is matched by.
    pub payment_reference: Option<String>,
    /// Virtual account the buyer pays into.
    pub virtual_account_number: Option<String>,
    /// On-chain hash once delivered.
    pub transaction_hash: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time; strictly increasing.
    pub updated_at: DateTime<Utc>,
    /// Diagnostics.
    pub metadata: Option<TransactionMetadata>,
}

/// Fields required to record a new transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Token bought.
    pub token_symbol: TokenSymbol,
    /// Fiat amount in kobo.
    pub amount_minor: i64,
    /// Tokens owed, smallest unit.
    pub crypto_amount: String,
    /// Destination wallet.
    pub wallet_address: String,
    /// Buyer contact.
    pub email: Option<String>,
    /// Rate at quote time.
    pub exchange_rate_minor: i64,
    /// Service fee in kobo.
    pub service_fee_minor: i64,
    /// Network fee in kobo.
    pub network_fee_minor: i64,
    /// Total in kobo.
    pub total_cost_minor: i64,
    /// Reference the payment will be matched by.
    pub payment_reference: Option<String>,
    /// Virtual account issued for the payment.
    pub virtual_account_number: Option<String>,
}

impl NewTransaction {
    /// Combine a validated order with the quote that priced it.
    #[must_use]
    pub fn from_quote(order: &Order, quote: &Quote) -> Self {
        Self {
            token_symbol: quote.token,
            amount_minor: quote.amount_minor,
            crypto_amount: quote.crypto_amount.clone(),
            wallet_address: order.wallet_address.clone(),
            email: order.email.clone(),
            exchange_rate_minor: quote.exchange_rate_minor,
            service_fee_minor: quote.service_fee_minor,
            network_fee_minor: quote.network_fee_minor,
            total_cost_minor: quote.total_cost_minor,
            payment_reference: None,
            virtual_account_number: None,
        }
    }

    /// Attach the payment reference.
    #[must_use]
    pub fn with_payment_reference(mut self, reference: impl Into<String>) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    /// Attach the virtual account number.
    #[must_use]
    pub fn with_virtual_account(mut self, account_number: impl Into<String>) -> Self {
        self.virtual_account_number = Some(account_number.into());
        self
    }

    /// Check every field and the fee identity.
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` listing every malformed field.
    /// - `CoreError::InconsistentFees` if `total != amount + fees`.
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();

        if let Err(msg) = check_amount(self.amount_minor) {
            errors.push("amount_minor", msg);
        }
        if let Err(msg) = check_wallet_address(&self.wallet_address) {
            errors.push("wallet_address", msg);
        }
        if let Some(Err(msg)) = self.email.as_deref().map(check_email) {
            errors.push("email", msg);
        }
        if self.exchange_rate_minor <= 0 {
            errors.push("exchange_rate_minor", "exchange rate must be positive");
        }
        if self.service_fee_minor < 0 || self.network_fee_minor < 0 {
            errors.push("fees", "fees cannot be negative");
        }
        match Decimal::from_str(&self.crypto_amount) {
            Ok(units) if !units.is_sign_negative() => {}
            _ => errors.push("crypto_amount", "crypto amount must be a non-negative decimal"),
        }
        errors.into_result(())?;

        let expected = self
            .amount_minor
            .checked_add(self.service_fee_minor)
            .and_then(|t| t.checked_add(self.network_fee_minor));
        if expected != Some(self.total_cost_minor) {
            return Err(CoreError::InconsistentFees(format!(
                "total {} != amount {} + service fee {} + network fee {}",
                self.total_cost_minor,
                self.amount_minor,
                self.service_fee_minor,
                self.network_fee_minor
            )));
        }
        Ok(())
    }
}

/// A partial change to a transaction. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionUpdate {
    /// Apply only while the transaction is in this status.
    pub expected_status: Option<PaymentStatus>,
    /// New status.
    pub payment_status: Option<PaymentStatus>,
    /// New payment reference.
    pub payment_reference: Option<String>,
    /// New virtual account number.
    pub virtual_account_number: Option<String>,
    /// On-chain hash.
    pub transaction_hash: Option<String>,
    /// Replacement diagnostics.
    pub metadata: Option<TransactionMetadata>,
}

impl TransactionUpdate {
    /// An update that moves to `status`.
    #[must_use]
    pub fn status(status: PaymentStatus) -> Self {
        Self {
            payment_status: Some(status),
            ..Self::default()
        }
    }

    /// Refuse the update unless the transaction is currently `status`.
    #[must_use]
    pub fn only_from(mut self, status: PaymentStatus) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Also set the payment reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    /// Also set the on-chain hash.
    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }

    /// Also set the diagnostics.
    #[must_use]
    pub fn with_metadata(mut self, metadata: TransactionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl Transaction {
    /// Record a new `pending` transaction.
    ///
    /// # Errors
    ///
    /// Propagates [`NewTransaction::validate`] failures.
    pub fn create(new: NewTransaction, now: DateTime<Utc>) -> Result<Self> {
        new.validate()?;
        let (id, created_at) = TransactionId::issue(now);

        Ok(Self {
            id,
            token_symbol: new.token_symbol,
            amount_minor: new.amount_minor,
            crypto_amount: new.crypto_amount,
            wallet_address: new.wallet_address,
            email: new.email,
            exchange_rate_minor: new.exchange_rate_minor,
            service_fee_minor: new.service_fee_minor,
            network_fee_minor: new.network_fee_minor,
            total_cost_minor: new.total_cost_minor,
            payment_status: PaymentStatus::Pending,
            payment_reference: new.payment_reference,
            virtual_account_number: new.virtual_account_number,
            transaction_hash: None,
            created_at,
            updated_at: created_at,
            metadata: None,
        })
    }

    /// Merge `update` into this transaction.
    ///
    /// On error the transaction is left unchanged.
    ///
    /// # Errors
    ///
    /// - `CoreError::Terminal` if the transaction is `confirmed` or `failed`.
    /// - `CoreError::UnexpectedStatus` if the update is guarded on another status.
    /// - `CoreError::InvalidTransition` if the status change is not allowed.
    pub fn apply(&mut self, update: &TransactionUpdate, now: DateTime<Utc>) -> Result<()> {
        if self.payment_status.is_terminal() {
            return Err(CoreError::Terminal {
                id: self.id,
                status: self.payment_status,
            });
        }
        if let Some(expected) = update.expected_status {
            if expected != self.payment_status {
                return Err(CoreError::UnexpectedStatus {
                    id: self.id,
                    expected,
                    actual: self.payment_status,
                });
            }
        }

        if let Some(next) = update.payment_status {
            if next != self.payment_status && !self.payment_status.can_transition_to(next) {
                return Err(CoreError::InvalidTransition {
                    id: self.id,
                    from: self.payment_status,
                    to: next,
                });
            }
            self.payment_status = next;
        }
        if let Some(reference) = &update.payment_reference {
            self.payment_reference = Some(reference.clone());
        }
        if let Some(account) = &update.virtual_account_number {
            self.virtual_account_number = Some(account.clone());
        }
        if let Some(hash) = &update.transaction_hash {
            self.transaction_hash = Some(hash.clone());
        }
        if let Some(metadata) = &update.metadata {
            self.metadata = Some(metadata.clone());
        }

        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
        Ok(())
    }

    /// Why the transaction failed, if it did.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        if self.payment_status == PaymentStatus::Failed {
            self.metadata.as_ref().and_then(TransactionMetadata::failure_reason)
        } else {
            None
        }
    }
}
