//! Trait definition for the Aptos REST API client.
//!
//! The [`AptosClient`] trait abstracts the REST operations the explorer
//! needs, so the plain HTTP client and the rate-limited wrapper are
//! interchangeable and tests can substitute their own implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use aptos_explorer_gateway::rest::{AptosClient, AptosRestClient};
//!
//! async fn print_height<C: AptosClient>(client: &C) -> Result<(), aptos_explorer_gateway::GatewayError> {
//!     let info = client.get_ledger_info().await?;
//!     println!("Block height: {}", info.block_height);
//!     Ok(())
//! }
//! ```

use std::future::Future;

use crate::error::GatewayError;
use crate::rest::types::{AccountData, Block, LedgerInfo, MoveResource, Transaction, ViewRequest};
use crate::types::{AccountAddress, Pagination};

/// The Aptos REST operations used by the explorer.
///
/// All methods are async and return `Result<T, GatewayError>`.
pub trait AptosClient: Send + Sync {
    /// Key under which this client's requests are rate limited.
    fn endpoint_key(&self) -> String;

    /// Get the current ledger information.
    fn get_ledger_info(&self) -> impl Future<Output = Result<LedgerInfo, GatewayError>> + Send;

    /// Get an account's sequence number and authentication key.
    fn get_account(
        &self,
        address: AccountAddress,
    ) -> impl Future<Output = Result<AccountData, GatewayError>> + Send;

    /// Get every resource stored under an account.
    fn get_account_resources(
        &self,
        address: AccountAddress,
    ) -> impl Future<Output = Result<Vec<MoveResource>, GatewayError>> + Send;

    /// Get transactions sent by an account.
    fn get_account_transactions(
        &self,
        address: AccountAddress,
        pagination: &Pagination,
    ) -> impl Future<Output = Result<Vec<Transaction>, GatewayError>> + Send;

    /// Get a transaction by hash.
    fn get_transaction_by_hash(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<Transaction, GatewayError>> + Send;

    /// Get a transaction by ledger version.
    fn get_transaction_by_version(
        &self,
        version: u64,
    ) -> impl Future<Output = Result<Transaction, GatewayError>> + Send;

    /// Get a block by height.
    fn get_block_by_height(
        &self,
        height: u64,
        with_transactions: bool,
    ) -> impl Future<Output = Result<Block, GatewayError>> + Send;

    /// Execute a view function.
    fn view(
        &self,
        request: &ViewRequest,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>, GatewayError>> + Send;
}
