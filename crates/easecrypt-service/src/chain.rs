//! On-chain transfer executors.

use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use easecrypt_core::{TokenSymbol, Transaction, TransactionId};

/// Error type for transfer execution.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The relayer refused the transfer.
    #[error("relayer rejected transfer ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The transfer did not go through.
    #[error("{0}")]
    Failed(String),
}

/// Instruction to move tokens to a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    /// Transaction being settled.
    #[serde(skip)]
    pub transaction_id: TransactionId,
    /// Token to send.
    pub token_symbol: TokenSymbol,
    /// Amount in the token's smallest unit.
    pub amount: String,
    /// Decimals of the token, for display on the relayer side.
    pub decimals: u32,
    /// Destination wallet.
    pub to_address: String,
    /// Idempotency reference.
    pub reference: String,
}

impl TransferRequest {
    /// Build the transfer owed for `transaction`.
    #[must_use]
    pub fn for_transaction(transaction: &Transaction) -> Self {
        Self {
            transaction_id: transaction.id,
            token_symbol: transaction.token_symbol,
            amount: transaction.crypto_amount.clone(),
            decimals: transaction.token_symbol.decimals(),
            to_address: transaction.wallet_address.clone(),
            reference: transaction.id.to_string(),
        }
    }
}

/// Something that can deliver tokens on-chain.
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Execute the transfer, returning its on-chain hash.
    async fn transfer(&self, request: &TransferRequest) -> Result<String, TransferError>;
}

/// Pretends to settle after a delay.
#[derive(Debug, Clone)]
pub struct SimulatedTransfer {
    delay: Duration,
    fail_with: Option<String>,
}

impl SimulatedTransfer {
    /// Settle every transfer after `delay`.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail_with: None,
        }
    }

    /// Fail every transfer with `reason` instead.
    #[must_use]
    pub fn failing(delay: Duration, reason: impl Into<String>) -> Self {
        Self {
            delay,
            fail_with: Some(reason.into()),
        }
    }
}

#[async_trait]
impl TransferExecutor for SimulatedTransfer {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<String, TransferError> {
        tokio::time::sleep(self.delay).await;

        if let Some(reason) = &self.fail_with {
            return Err(TransferError::Failed(reason.clone()));
        }

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let hash = format!("0x{}", hex::encode(bytes));

        tracing::debug!(
            transaction_id = %request.transaction_id,
            transaction_hash = %hash,
            "Simulated transfer settled"
        );
        Ok(hash)
    }
}

/// Custody relayer response.
#[derive(Debug, Deserialize)]
struct RelayerResponse {
    transaction_hash: String,
}

/// Sends transfers through a custody relayer.
#[derive(Debug, Clone)]
pub struct RelayerTransfer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RelayerTransfer {
    /// Create a relayer client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, TransferError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl TransferExecutor for RelayerTransfer {
    fn name(&self) -> &'static str {
        "relayer"
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<String, TransferError> {
        let url = format!("{}/transfers", self.base_url);

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: RelayerResponse = response.json().await?;
        if body.transaction_hash.is_empty() {
            return Err(TransferError::Failed("relayer returned an empty hash".into()));
        }
        Ok(body.transaction_hash)
    }
}
