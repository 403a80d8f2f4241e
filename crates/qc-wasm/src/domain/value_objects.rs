//! # Value Objects
//!
//! Immutable domain primitives for contract execution.
//! These types represent concepts that are defined by their value, not identity.

use crate::errors::WasmError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{serde_as, DisplayFromStr};
use std::fmt;

/// Dense code identifier, first code is 1.
pub type CodeId = u64;

/// Human readable part of the bech32 address encoding.
pub const ADDRESS_HRP: &str = "wasm";

/// Length of a derived contract address.
pub const CONTRACT_ADDR_LEN: usize = 32;

/// Longest address the ledger accepts.
pub const MAX_ADDR_LEN: usize = 255;

// =============================================================================
// ADDRESS
// =============================================================================

/// A ledger account address.
///
/// User accounts are usually 20 bytes, contract accounts are
/// [`CONTRACT_ADDR_LEN`] bytes. The text form is bech32 with [`ADDRESS_HRP`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(Vec<u8>);

impl Address {
    /// Creates an address from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true if no bytes are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the length rules applied to every stored address.
    pub fn validate(&self) -> Result<(), WasmError> {
        if self.0.is_empty() {
            return Err(WasmError::InvalidAddress("empty address".into()));
        }
        if self.0.len() > MAX_ADDR_LEN {
            return Err(WasmError::InvalidAddress(format!(
                "address max length is {MAX_ADDR_LEN}, got {}",
                self.0.len()
            )));
        }
        Ok(())
    }

    /// Parses the bech32 text form.
    pub fn from_bech32(text: &str) -> Result<Self, WasmError> {
        let (hrp, data, variant) = bech32::decode(text)
            .map_err(|e| WasmError::InvalidAddress(format!("{text}: {e}")))?;
        if hrp != ADDRESS_HRP || variant != Variant::Bech32 {
            return Err(WasmError::InvalidAddress(format!(
                "{text}: expected prefix {ADDRESS_HRP}"
            )));
        }
        let bytes = Vec::<u8>::from_base32(&data)
            .map_err(|e| WasmError::InvalidAddress(format!("{text}: {e}")))?;
        let addr = Self(bytes);
        addr.validate()?;
        Ok(addr)
    }

    /// Bytes prefixed by their length, as used inside store keys.
    #[must_use]
    pub fn length_prefixed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        // validate() caps the length at 255
        out.push(u8::try_from(self.0.len()).unwrap_or(u8::MAX));
        out.extend_from_slice(&self.0);
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match bech32::encode(ADDRESS_HRP, self.0.to_base32(), Variant::Bech32) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl From<&[u8]> for Address {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

// =============================================================================
// CHECKSUM (32 bytes)
// =============================================================================

/// SHA-256 of the uncompressed wasm code; the engine's code identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Checksum(pub [u8; 32]);

impl Checksum {
    /// Creates a checksum from a 32-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Creates a checksum from a slice. Returns None if wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(slice).ok().map(Self)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", hex::encode(self.0))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

// =============================================================================
// BINARY
// =============================================================================

/// Opaque bytes that travel as base64 in contract JSON.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Binary(pub Vec<u8>);

impl Binary {
    /// Wraps raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Base64 text form.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl fmt::Debug for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binary({})", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Binary {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Binary> for Vec<u8> {
    fn from(bin: Binary) -> Self {
        bin.0
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// COIN
// =============================================================================

/// A token amount. The amount travels as a decimal string in JSON.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coin {
    /// Token denomination.
    pub denom: String,
    /// Amount in the smallest unit.
    #[serde_as(as = "DisplayFromStr")]
    pub amount: u128,
}

impl Coin {
    /// Creates a coin.
    #[must_use]
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Debug for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Checks a coin list: valid denoms, positive amounts, no duplicates.
pub fn validate_coins(coins: &[Coin]) -> Result<(), WasmError> {
    let mut seen = std::collections::BTreeSet::new();
    for coin in coins {
        let denom_ok = (3..=128).contains(&coin.denom.len())
            && coin.denom.starts_with(|c: char| c.is_ascii_alphabetic())
            && coin
                .denom
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));
        if !denom_ok {
            return Err(WasmError::InvalidCoins(format!("invalid denom: {}", coin.denom)));
        }
        if coin.amount == 0 {
            return Err(WasmError::InvalidCoins(format!("zero amount: {coin}")));
        }
        if !seen.insert(coin.denom.as_str()) {
            return Err(WasmError::InvalidCoins(format!("duplicate denom: {}", coin.denom)));
        }
    }
    Ok(())
}

/// Renders a coin list the way bank events print it.
#[must_use]
pub fn coins_to_string(coins: &[Coin]) -> String {
    coins
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// TESTS
// =============================================================================
