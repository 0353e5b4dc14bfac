//! Response and request types for the Aptos REST API.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use time::OffsetDateTime;

use crate::types::AccountAddress;
use crate::types::serde_helpers::{option_timestamp_micros, timestamp_micros};

/// Current state of the ledger, as returned by `GET /`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    /// Chain id (1 on mainnet)
    pub chain_id: u8,
    /// Current epoch
    #[serde_as(as = "DisplayFromStr")]
    pub epoch: u64,
    /// Latest committed version
    #[serde_as(as = "DisplayFromStr")]
    pub ledger_version: u64,
    /// Oldest version the node still serves
    #[serde_as(as = "DisplayFromStr")]
    pub oldest_ledger_version: u64,
    /// Timestamp of the latest version
    #[serde(with = "timestamp_micros")]
    pub ledger_timestamp: OffsetDateTime,
    /// Role of the node answering (`full_node`, `validator`)
    pub node_role: String,
    /// Oldest block the node still serves
    #[serde_as(as = "DisplayFromStr")]
    pub oldest_block_height: u64,
    /// Latest block height
    #[serde_as(as = "DisplayFromStr")]
    pub block_height: u64,
    /// Build of the node software
    #[serde(default)]
    pub git_hash: Option<String>,
}

/// Account core data.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    /// Next sequence number the account will use
    #[serde_as(as = "DisplayFromStr")]
    pub sequence_number: u64,
    /// Hex-encoded authentication key
    pub authentication_key: String,
}

/// A Move resource stored under an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResource {
    /// Fully qualified struct tag, e.g. `0x1::account::Account`
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource contents
    pub data: serde_json::Value,
}

/// A committed, pending or genesis transaction.
///
/// Only the fields the explorer lists are typed; everything else stays in
/// `extra`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Kind, e.g. `user_transaction`, `block_metadata_transaction`
    #[serde(rename = "type")]
    pub transaction_type: String,
    /// Transaction hash
    pub hash: String,
    /// Ledger version, absent for pending transactions
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub version: Option<u64>,
    /// Whether execution succeeded
    #[serde(default)]
    pub success: Option<bool>,
    /// VM status string
    #[serde(default)]
    pub vm_status: Option<String>,
    /// Sender, for user transactions
    #[serde(default)]
    pub sender: Option<AccountAddress>,
    /// Gas consumed
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub gas_used: Option<u64>,
    /// Commit timestamp
    #[serde(default, with = "option_timestamp_micros")]
    pub timestamp: Option<OffsetDateTime>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Transaction {
    /// Whether this is a user-submitted transaction.
    pub fn is_user_transaction(&self) -> bool {
        self.transaction_type == "user_transaction"
    }
}

/// A block and, optionally, its transactions.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block height
    #[serde_as(as = "DisplayFromStr")]
    pub block_height: u64,
    /// Block hash
    pub block_hash: String,
    /// Block timestamp
    #[serde(with = "timestamp_micros")]
    pub block_timestamp: OffsetDateTime,
    /// First transaction version in the block
    #[serde_as(as = "DisplayFromStr")]
    pub first_version: u64,
    /// Last transaction version in the block
    #[serde_as(as = "DisplayFromStr")]
    pub last_version: u64,
    /// Transactions, when requested
    #[serde(default)]
    pub transactions: Option<Vec<Transaction>>,
}

impl Block {
    /// Number of versions in the block.
    pub fn transaction_count(&self) -> u64 {
        self.last_version.saturating_sub(self.first_version) + 1
    }
}

/// A view function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRequest {
    /// Function id, e.g. `0x1::coin::balance`
    pub function: String,
    /// Generic type arguments
    pub type_arguments: Vec<String>,
    /// JSON-encoded arguments
    pub arguments: Vec<serde_json::Value>,
}

impl ViewRequest {
    /// A call with no type arguments or arguments.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            type_arguments: Vec::new(),
            arguments: Vec::new(),
        }
    }

    /// Add a type argument.
    pub fn type_argument(mut self, type_argument: impl Into<String>) -> Self {
        self.type_arguments.push(type_argument.into());
        self
    }

    /// Add an argument.
    pub fn argument(mut self, argument: impl Into<serde_json::Value>) -> Self {
        self.arguments.push(argument.into());
        self
    }
}

/// Error body returned by the Aptos API on failures.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct AptosErrorBody {
    pub message: String,
    #[serde(default)]
    pub error_code: Option<String>,
}
