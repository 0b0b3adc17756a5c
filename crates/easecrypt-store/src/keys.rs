//! Key encoding for the `RocksDB` column families.

use easecrypt_core::{TokenSymbol, TransactionId};

const WALLET_SEPARATOR: u8 = 0;

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a wallet-transaction index key.
///
/// Format: `wallet (ascii) || 0x00 || transaction_id (16 bytes)`
///
/// ULIDs are time-ordered, so a wallet's transactions sort by creation.
#[must_use]
pub fn wallet_transaction_key(wallet: &str, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = wallet_transactions_prefix(wallet);
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Prefix shared by every index entry of one wallet.
#[must_use]
pub fn wallet_transactions_prefix(wallet: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(wallet.len() + 17);
    key.extend_from_slice(wallet.as_bytes());
    key.push(WALLET_SEPARATOR);
    key
}

/// Extract the transaction ID from a wallet-transaction index key.
///
/// Returns `None` if the key is too short to hold one.
#[must_use]
pub fn extract_transaction_id_from_wallet_key(key: &[u8]) -> Option<TransactionId> {
    let start = key.len().checked_sub(16)?;
    let bytes: [u8; 16] = key[start..].try_into().ok()?;
    Some(TransactionId::from_bytes(bytes))
}

/// Create a payment-reference index key.
#[must_use]
pub fn reference_key(reference: &str) -> Vec<u8> {
    reference.as_bytes().to_vec()
}

/// Create a payment-session key from the owning transaction's ID.
#[must_use]
pub fn session_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a rate key from a token.
#[must_use]
pub fn rate_key(symbol: TokenSymbol) -> Vec<u8> {
    symbol.as_str().as_bytes().to_vec()
}
