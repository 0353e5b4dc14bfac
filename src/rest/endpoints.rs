//! Aptos REST API endpoint paths, relative to the `/v1` base URL.

use crate::types::AccountAddress;

/// Ledger information.
pub const LEDGER_INFO: &str = "/";
/// View function execution.
pub const VIEW: &str = "/view";

/// Account details.
pub fn account(address: &AccountAddress) -> String {
    format!("/accounts/{}", address)
}

/// Resources stored under an account.
pub fn account_resources(address: &AccountAddress) -> String {
    format!("/accounts/{}/resources", address)
}

/// Transactions sent by an account.
pub fn account_transactions(address: &AccountAddress) -> String {
    format!("/accounts/{}/transactions", address)
}

/// A transaction by hash.
pub fn transaction_by_hash(hash: &str) -> String {
    format!("/transactions/by_hash/{}", hash)
}

/// A transaction by ledger version.
pub fn transaction_by_version(version: u64) -> String {
    format!("/transactions/by_version/{}", version)
}

/// A block by height.
pub fn block_by_height(height: u64) -> String {
    format!("/blocks/by_height/{}", height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(
            account_resources(&AccountAddress::ONE),
            "/accounts/0x0000000000000000000000000000000000000000000000000000000000000001/resources"
        );
        assert_eq!(transaction_by_version(42), "/transactions/by_version/42");
        assert_eq!(block_by_height(7), "/blocks/by_height/7");
    }
}
