//! Common domain types for the Aptos API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::GatewayError;

/// An Aptos network the explorer can point at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Network {
    /// Aptos mainnet
    Mainnet,
    /// Aptos testnet
    Testnet,
    /// Aptos devnet
    Devnet,
    /// A local node on the default port
    Local,
    /// Any other fullnode REST endpoint
    Custom(Url),
}

impl Network {
    /// Base URL of the network's REST API, including the `/v1` prefix.
    pub fn base_url(&self) -> String {
        match self {
            Network::Mainnet => "https://api.mainnet.aptoslabs.com/v1".to_string(),
            Network::Testnet => "https://api.testnet.aptoslabs.com/v1".to_string(),
            Network::Devnet => "https://api.devnet.aptoslabs.com/v1".to_string(),
            Network::Local => "http://127.0.0.1:8080/v1".to_string(),
            Network::Custom(url) => url.as_str().trim_end_matches('/').to_string(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Devnet => write!(f, "devnet"),
            Network::Local => write!(f, "local"),
            Network::Custom(url) => write!(f, "{}", url),
        }
    }
}

impl FromStr for Network {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "local" | "localnet" => Ok(Network::Local),
            _ => Ok(Network::Custom(Url::parse(s)?)),
        }
    }
}

/// A 32-byte Aptos account address.
///
/// Parses both the short (`0x1`) and long forms, with or without the `0x`
/// prefix, and always displays the long lowercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress([u8; AccountAddress::LENGTH]);

impl AccountAddress {
    /// Address length in bytes.
    pub const LENGTH: usize = 32;

    /// The `0x1` framework address.
    pub const ONE: AccountAddress = {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[Self::LENGTH - 1] = 1;
        AccountAddress(bytes)
    };

    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    /// The long hex form with a `0x` prefix.
    pub fn to_hex_literal(&self) -> String {
        let mut out = String::with_capacity(2 + Self::LENGTH * 2);
        out.push_str("0x");
        for byte in self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl FromStr for AccountAddress {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if hex.is_empty() {
            return Err(GatewayError::InvalidInput(format!(
                "empty account address: {:?}",
                s
            )));
        }
        if hex.len() > Self::LENGTH * 2 {
            return Err(GatewayError::InvalidInput(format!(
                "account address longer than {} hex digits: {}",
                Self::LENGTH * 2,
                s
            )));
        }

        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(GatewayError::InvalidInput(format!(
                "account address is not hex: {}",
                s
            )));
        }

        // Left-pad short addresses to the full width.
        let padded = format!("{:0>width$}", hex, width = Self::LENGTH * 2);
        let mut bytes = [0u8; Self::LENGTH];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &padded[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| {
                GatewayError::InvalidInput(format!("account address is not hex: {}", s))
            })?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_literal())
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_literal())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Cursor-style pagination used by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Sequence number or version to start from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    /// Maximum number of items to return
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u16>,
}

impl Pagination {
    /// Pagination starting at `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            start: Some(start),
            limit: None,
        }
    }

    /// Limit the page size.
    pub fn limit(mut self, limit: u16) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_short_form() {
        let address: AccountAddress = "0x1".parse().unwrap();
        assert_eq!(address, AccountAddress::ONE);
        assert_eq!(
            address.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_address_normalizes_case_and_prefix() {
        let upper: AccountAddress = "0xABCDEF".parse().unwrap();
        let bare: AccountAddress = "abcdef".parse().unwrap();
        assert_eq!(upper, bare);
        assert!(upper.to_string().ends_with("abcdef"));
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!(matches!(
            "0x".parse::<AccountAddress>(),
            Err(GatewayError::InvalidInput(_))
        ));
        assert!(matches!(
            "0xzz".parse::<AccountAddress>(),
            Err(GatewayError::InvalidInput(_))
        ));
        let too_long = format!("0x{}", "1".repeat(65));
        assert!(matches!(
            too_long.parse::<AccountAddress>(),
            Err(GatewayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_address_serde() {
        let json = serde_json::to_string(&AccountAddress::ONE).unwrap();
        assert_eq!(
            json,
            "\"0x0000000000000000000000000000000000000000000000000000000000000001\""
        );
        let parsed: AccountAddress = serde_json::from_str("\"0x1\"").unwrap();
        assert_eq!(parsed, AccountAddress::ONE);
    }

    #[test]
    fn test_network_base_urls() {
        assert_eq!(
            Network::Mainnet.base_url(),
            "https://api.mainnet.aptoslabs.com/v1"
        );
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Testnet);

        let custom: Network = "https://fullnode.example.com/v1/".parse().unwrap();
        assert_eq!(custom.base_url(), "https://fullnode.example.com/v1");
    }

    #[test]
    fn test_pagination_query() {
        let page = Pagination::starting_at(10).limit(25);
        assert_eq!(serde_urlencoded::to_string(&page).unwrap(), "start=10&limit=25");
        assert_eq!(serde_urlencoded::to_string(Pagination::default()).unwrap(), "");
    }
}
