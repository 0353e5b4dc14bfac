//! Aptos REST API client.
//!
//! [`AptosRestClient`] talks to a fullnode's `/v1` API and reports failures
//! as [`GatewayError::Api`](crate::GatewayError::Api), which the classifier
//! maps onto the gateway's error taxonomy.
//!
//! # Example
//!
//! ```rust,no_run
//! use aptos_explorer_gateway::rest::{AptosClient, AptosRestClient};
//! use aptos_explorer_gateway::types::{AccountAddress, Network};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AptosRestClient::builder()
//!         .network(Network::Testnet)
//!         .api_key_from_env()
//!         .build();
//!
//!     let account = client.get_account(AccountAddress::ONE).await?;
//!     println!("Sequence number: {}", account.sequence_number);
//!     Ok(())
//! }
//! ```

mod client;
pub mod endpoints;
mod traits;
pub mod types;

pub use client::{API_KEY_ENV, AptosRestClient, AptosRestClientBuilder};
pub use traits::AptosClient;
pub use types::{AccountData, Block, LedgerInfo, MoveResource, Transaction, ViewRequest};
