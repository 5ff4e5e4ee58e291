//! Utility functions for minting opaque identifiers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique identifier then encode using bech32
pub fn new_bech32_id(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Mint a fresh dataset identifier.
pub fn new_dataset_id() -> anyhow::Result<String> {
    new_bech32_id("dataset")
}

/// Mint a fresh principal identifier.
pub fn new_principal_id() -> anyhow::Result<String> {
    new_bech32_id("principal")
}
