//! Aptos REST API client implementation.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use url::Url;

use crate::error::{ApiError, GatewayError};
use crate::rest::endpoints;
use crate::rest::traits::AptosClient;
use crate::rest::types::{
    AccountData, AptosErrorBody, Block, LedgerInfo, MoveResource, Transaction, ViewRequest,
};
use crate::types::{AccountAddress, Network, Pagination};

/// Environment variable read by [`AptosRestClientBuilder::api_key_from_env`].
pub const API_KEY_ENV: &str = "APTOS_API_KEY";

/// The Aptos REST API client.
///
/// Requests go out directly, without rate limiting; wrap the client in a
/// [`RateLimitedClient`](crate::rate_limit::RateLimitedClient) to share a
/// per-host budget and retry throttled calls.
///
/// # Example
///
/// ```rust,no_run
/// use aptos_explorer_gateway::rest::{AptosClient, AptosRestClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AptosRestClient::new();
///     let info = client.get_ledger_info().await?;
///     println!("Ledger version: {}", info.ledger_version);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AptosRestClient {
    http_client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
}

impl AptosRestClient {
    /// Create a mainnet client with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> AptosRestClientBuilder {
        AptosRestClientBuilder::new()
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request.
    async fn get<T>(&self, endpoint: &str) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.get_with_params(endpoint, &()).await
    }

    /// Make a GET request with query parameters.
    async fn get_with_params<T, Q>(&self, endpoint: &str, params: &Q) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let query_string = serde_urlencoded::to_string(params)
            .map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
        let url = if query_string.is_empty() {
            self.url(endpoint)
        } else {
            format!("{}?{}", self.url(endpoint), query_string)
        };

        let mut request = self.http_client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    /// Make a POST request with a JSON body.
    async fn post_json<T, B>(&self, endpoint: &str, body: &B) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body)?;
        let mut request = self
            .http_client
            .post(self.url(endpoint))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint == endpoints::LEDGER_INFO {
            self.base_url.clone()
        } else {
            format!("{}{}", self.base_url, endpoint)
        }
    }

    /// Parse a response, turning non-success statuses into [`ApiError`]s.
    async fn parse_response<T>(&self, response: reqwest::Response) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Api(api_error(status, &body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            GatewayError::InvalidResponse(format!("Failed to parse response: {}. Body: {}", e, body))
        })
    }
}

/// Build an [`ApiError`] from a failed response.
fn api_error(status: StatusCode, body: &str) -> ApiError {
    let status_text = status.canonical_reason().unwrap_or_default();
    match serde_json::from_str::<AptosErrorBody>(body) {
        Ok(parsed) => {
            let error = ApiError::new(status.as_u16(), status_text, parsed.message);
            match parsed.error_code {
                Some(code) => error.with_error_code(code),
                None => error,
            }
        }
        Err(_) => ApiError::new(status.as_u16(), status_text, body.trim()),
    }
}

/// Check that `hash` looks like a transaction hash before sending it.
fn validate_hash(hash: &str) -> Result<(), GatewayError> {
    let hex = hash.strip_prefix("0x").unwrap_or(hash);
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(GatewayError::InvalidInput(format!(
            "not a transaction hash: {}",
            hash
        )));
    }
    Ok(())
}

impl Default for AptosRestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AptosRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AptosRestClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

/// Builder for [`AptosRestClient`].
pub struct AptosRestClientBuilder {
    base_url: String,
    api_key: Option<String>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl AptosRestClientBuilder {
    /// Create a new builder pointing at mainnet.
    pub fn new() -> Self {
        Self {
            base_url: Network::Mainnet.base_url(),
            api_key: None,
            user_agent: None,
            timeout: None,
        }
    }

    /// Point the client at a network.
    pub fn network(mut self, network: Network) -> Self {
        self.base_url = network.base_url();
        self
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send an API key as a bearer token.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Read the API key from `APTOS_API_KEY`, if set.
    pub fn api_key_from_env(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set a per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> AptosRestClient {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("aptos-explorer-gateway/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("aptos-explorer-gateway"));
        headers.insert(USER_AGENT, header_value);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let reqwest_client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        // Retries are left to the rate limiter, which only retries 429s.
        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        AptosRestClient {
            http_client: client,
            base_url: self.base_url,
            api_key: self.api_key,
        }
    }
}

impl Default for AptosRestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Serialize)]
struct BlockParams {
    with_transactions: bool,
}

impl AptosClient for AptosRestClient {
    /// The API host, plus port if any.
    fn endpoint_key(&self) -> String {
        match Url::parse(&self.base_url) {
            Ok(url) => match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                (None, _) => self.base_url.clone(),
            },
            Err(_) => self.base_url.clone(),
        }
    }

    async fn get_ledger_info(&self) -> Result<LedgerInfo, GatewayError> {
        self.get(endpoints::LEDGER_INFO).await
    }

    async fn get_account(&self, address: AccountAddress) -> Result<AccountData, GatewayError> {
        self.get(&endpoints::account(&address)).await
    }

    async fn get_account_resources(
        &self,
        address: AccountAddress,
    ) -> Result<Vec<MoveResource>, GatewayError> {
        self.get(&endpoints::account_resources(&address)).await
    }

    async fn get_account_transactions(
        &self,
        address: AccountAddress,
        pagination: &Pagination,
    ) -> Result<Vec<Transaction>, GatewayError> {
        self.get_with_params(&endpoints::account_transactions(&address), pagination)
            .await
    }

    async fn get_transaction_by_hash(&self, hash: &str) -> Result<Transaction, GatewayError> {
        validate_hash(hash)?;
        self.get(&endpoints::transaction_by_hash(hash)).await
    }

    async fn get_transaction_by_version(&self, version: u64) -> Result<Transaction, GatewayError> {
        self.get(&endpoints::transaction_by_version(version)).await
    }

    async fn get_block_by_height(
        &self,
        height: u64,
        with_transactions: bool,
    ) -> Result<Block, GatewayError> {
        self.get_with_params(
            &endpoints::block_by_height(height),
            &BlockParams { with_transactions },
        )
        .await
    }

    async fn view(&self, request: &ViewRequest) -> Result<Vec<serde_json::Value>, GatewayError> {
        self.post_json(endpoints::VIEW, request).await
    }
}
