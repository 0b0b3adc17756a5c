//! EaseCrypt HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use easecrypt_core::TokenSymbol;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, ConfirmResponse, CreateTransactionRequest, CreateTransactionResponse,
    HealthResponse, HistoryPage, Quote, QuoteRequest, Rates, StatusResponse, Violation,
};

/// EaseCrypt API client.
///
/// Covers the purchase flow: rates, quotes, creating a transaction and
/// following it to delivery.
#[derive(Debug, Clone)]
pub struct EaseCryptClient {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl EaseCryptClient {
    /// Create a client for the service at `base_url` (e.g. `"http://easecrypt:8080"`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(options.poll_interval_ms),
            poll_timeout: Duration::from_secs(options.poll_timeout_seconds),
        })
    }

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Current prices of every supported token, in kobo.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn rates(&self) -> Result<Rates, ClientError> {
        let url = format!("{}/rates", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Price a purchase of `token_symbol` for `amount_minor` kobo.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RateUnavailable`] when the service has no
    /// price for the token, [`ClientError::Validation`] for out-of-range
    /// amounts.
    pub async fn quote(
        &self,
        token_symbol: TokenSymbol,
        amount_minor: i64,
    ) -> Result<Quote, ClientError> {
        let url = format!("{}/quote", self.base_url);
        let request = QuoteRequest {
            token_symbol,
            amount_minor,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    /// Create a transaction and receive the account to pay into.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreateTransactionResponse, ClientError> {
        let url = format!("{}/transactions", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        let created: CreateTransactionResponse = self.handle_response(response).await?;

        tracing::debug!(
            transaction_id = %created.transaction_id,
            payment_reference = %created.payment_reference,
            "Transaction created"
        );
        Ok(created)
    }

    /// Current status of a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown transaction.
    pub async fn status(&self, transaction_id: &str) -> Result<StatusResponse, ClientError> {
        let url = format!("{}/transactions/{transaction_id}/status", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Confirm payment manually. Only honored by deployments that enable it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionExpired`] when the payment window has
    /// closed.
    pub async fn confirm(&self, transaction_id: &str) -> Result<ConfirmResponse, ClientError> {
        let url = format!("{}/transactions/{transaction_id}/confirm", self.base_url);
        let response = self.client.post(&url).send().await?;
        self.handle_response(response).await
    }

    /// A page of a wallet's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn history(
        &self,
        wallet_address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage, ClientError> {
        let url = format!("{}/history/{wallet_address}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Poll a transaction until it is confirmed or failed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] if it is still in flight once the
    /// configured poll timeout has passed.
    pub async fn wait_for_completion(
        &self,
        transaction_id: &str,
    ) -> Result<StatusResponse, ClientError> {
        let deadline = tokio::time::Instant::now() + self.poll_timeout;

        loop {
            let status = self.status(transaction_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(ClientError::Timeout {
                    transaction_id: transaction_id.to_string(),
                    status: status.status.to_string(),
                });
            }

            tracing::trace!(transaction_id, status = %status.status, "Waiting for transaction");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;

                match code {
                    "validation_error" => {
                        let violations = api_error
                            .error
                            .details
                            .map(serde_json::from_value::<Vec<Violation>>)
                            .transpose()?
                            .unwrap_or_default();
                        Err(ClientError::Validation { violations })
                    }
                    "rate_unavailable" => Err(ClientError::RateUnavailable(message)),
                    "not_found" => Err(ClientError::NotFound(message)),
                    "session_expired" => Err(ClientError::SessionExpired(message)),
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Delay between status polls in milliseconds (default: 2000).
    pub poll_interval_ms: u64,
    /// How long [`EaseCryptClient::wait_for_completion`] waits (default: 600).
    pub poll_timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            poll_interval_ms: 2_000,
            poll_timeout_seconds: 600,
        }
    }
}
