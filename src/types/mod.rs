//! Common types used across the gateway.

pub mod common;
pub mod serde_helpers;

pub use common::*;
