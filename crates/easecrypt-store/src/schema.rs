//! Column families used by the `RocksDB` backend.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by wallet, keyed by `wallet || 0x00 || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_WALLET: &str = "transactions_by_wallet";

    /// Index: payment reference to `transaction_id`.
    pub const TRANSACTIONS_BY_REFERENCE: &str = "transactions_by_reference";

    /// Payment sessions, keyed by the `transaction_id` they belong to.
    pub const PAYMENT_SESSIONS: &str = "payment_sessions";

    /// Last observed rate per token, keyed by ticker.
    pub const RATES: &str = "rates";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_WALLET,
        cf::TRANSACTIONS_BY_REFERENCE,
        cf::PAYMENT_SESSIONS,
        cf::RATES,
    ]
}
