//! # Domain Services
//!
//! Pure helper functions for contract lifecycle operations.
//! These functions are deterministic and have no side effects.

use crate::domain::value_objects::{Address, Checksum, CodeId, CONTRACT_ADDR_LEN};
use crate::errors::{WasmError, WasmResult};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::io::Read;

/// Module name used as the address derivation domain.
pub const MODULE_NAME: &str = "wasm";

/// Prefix of IBC ports owned by contracts.
pub const PORT_ID_PREFIX: &str = "wasm.";

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

// =============================================================================
// ADDRESS DERIVATION
// =============================================================================

/// `sha256(sha256(typ) || key)`.
#[must_use]
pub fn address_hash(typ: &str, key: &[u8]) -> [u8; 32] {
    let th = Sha256::digest(typ.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(th);
    hasher.update(key);
    hasher.finalize().into()
}

/// Address of a module account derived from `key`.
#[must_use]
pub fn module_address(name: &str, key: &[u8]) -> Address {
    let mut preimage = Vec::with_capacity(name.len() + 1 + key.len());
    preimage.extend_from_slice(name.as_bytes());
    preimage.push(0);
    preimage.extend_from_slice(key);
    Address::new(address_hash("module", &preimage).to_vec())
}

/// Deterministic contract address for the `instance_id`-th contract of `code_id`.
///
/// Address = `module("wasm", code_id_be || instance_id_be)`, truncated to
/// [`CONTRACT_ADDR_LEN`] bytes.
#[must_use]
pub fn build_contract_address(code_id: CodeId, instance_id: u64) -> Address {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&code_id.to_be_bytes());
    key[8..].copy_from_slice(&instance_id.to_be_bytes());
    let full = module_address(MODULE_NAME, &key);
    Address::new(&full.as_bytes()[..CONTRACT_ADDR_LEN])
}

/// IBC port owned by `contract`.
#[must_use]
pub fn port_id_for_contract(contract: &Address) -> String {
    format!("{PORT_ID_PREFIX}{contract}")
}

/// Reverses [`port_id_for_contract`].
pub fn contract_from_port_id(port_id: &str) -> WasmResult<Address> {
    let text = port_id
        .strip_prefix(PORT_ID_PREFIX)
        .ok_or_else(|| WasmError::InvalidRequest(format!("invalid port id: {port_id}")))?;
    Address::from_bech32(text)
}

// =============================================================================
// CODE HANDLING
// =============================================================================

/// SHA-256 of `code`.
#[must_use]
pub fn checksum(code: &[u8]) -> Checksum {
    Checksum::new(Sha256::digest(code).into())
}

/// Returns true if `code` starts with the gzip magic bytes.
#[must_use]
pub fn is_gzip(code: &[u8]) -> bool {
    code.starts_with(&GZIP_MAGIC)
}

/// Returns true if `code` starts with the wasm magic bytes.
#[must_use]
pub fn is_wasm(code: &[u8]) -> bool {
    code.starts_with(&WASM_MAGIC)
}

/// Inflates gzip input, refusing output larger than `limit` bytes.
///
/// Non gzip input is returned as is, subject to the same limit.
pub fn uncompress(code: &[u8], limit: usize) -> WasmResult<Vec<u8>> {
    if !is_gzip(code) {
        if code.len() > limit {
            return Err(WasmError::Limit(format!(
                "uncompressed size {} exceeds {limit}",
                code.len()
            )));
        }
        return Ok(code.to_vec());
    }
    let cap = u64::try_from(limit)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    let mut out = Vec::new();
    GzDecoder::new(code)
        .take(cap)
        .read_to_end(&mut out)
        .map_err(|e| WasmError::CreateFailed(format!("cannot uncompress: {e}")))?;
    if out.len() > limit {
        return Err(WasmError::Limit(format!("uncompressed size exceeds {limit}")));
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================
