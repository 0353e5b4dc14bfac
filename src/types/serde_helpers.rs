//! Serde helpers for the Aptos API's wire formats.
//!
//! The REST API encodes every `u64` as a decimal string and ledger timestamps
//! as microseconds since the UNIX epoch, also as strings. Plain `u64` fields
//! use `serde_with::DisplayFromStr`; timestamps go through the modules here.

use serde::{de, Deserialize, Deserializer, Serializer};
use time::OffsetDateTime;

const NANOS_PER_MICRO: i128 = 1_000;

fn from_micros<E: de::Error>(raw: &str) -> Result<OffsetDateTime, E> {
    let micros: i128 = raw
        .parse()
        .map_err(|e| de::Error::custom(format!("invalid microsecond timestamp {:?}: {}", raw, e)))?;
    OffsetDateTime::from_unix_timestamp_nanos(micros * NANOS_PER_MICRO).map_err(de::Error::custom)
}

fn to_micros(value: &OffsetDateTime) -> String {
    (value.unix_timestamp_nanos() / NANOS_PER_MICRO).to_string()
}

/// Serialize/deserialize an `OffsetDateTime` as a string of microseconds.
///
/// # Example
///
/// ```rust
/// use serde::Deserialize;
/// use time::OffsetDateTime;
/// use aptos_explorer_gateway::types::serde_helpers::timestamp_micros;
///
/// #[derive(Deserialize)]
/// struct Block {
///     #[serde(with = "timestamp_micros")]
///     block_timestamp: OffsetDateTime,
/// }
///
/// let block: Block = serde_json::from_str(r#"{"block_timestamp":"1700000000000000"}"#).unwrap();
/// assert_eq!(block.block_timestamp.unix_timestamp(), 1_700_000_000);
/// ```
pub mod timestamp_micros {
    use super::*;

    /// Serialize as a microsecond string.
    pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_micros(value))
    }

    /// Deserialize from a microsecond string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        from_micros(&raw)
    }
}

/// Like [`timestamp_micros`] for fields the API may omit.
///
/// Use together with `#[serde(default)]`.
pub mod option_timestamp_micros {
    use super::*;

    /// Serialize as a microsecond string, or `null`.
    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_some(&to_micros(value)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from a microsecond string or `null`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => from_micros(&raw).map(Some),
            None => Ok(None),
        }
    }
}
