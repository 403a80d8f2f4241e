//! Persisted key layout.
//!
//! | Prefix | Record | Key |
//! |--------|--------|-----|
//! | `0x01` | Code info | `code_id` |
//! | `0x02` | Contract info | `lp(addr)` |
//! | `0x03` | Contract storage | `lp(addr) ‖ key` |
//! | `0x04` | Sequences | name |
//! | `0x05` | Code history | `lp(addr) ‖ position` |
//! | `0x06` | Contracts by code | `code_id ‖ tx position ‖ addr` |
//! | `0x07` | Pinned flag | `code_id` |
//! | `0x08` | Params | |
//! | `0x10` | Bank accounts | `addr` |
//! | `0x11` | Bank balances | `lp(addr) ‖ denom` |
//! | `0x12` | Bound ports | `port id` |
//!
//! `lp(x)` is `x` prefixed by its length byte. Integers are big-endian.

use crate::domain::entities::AbsoluteTxPosition;
use crate::domain::value_objects::{Address, CodeId};

/// Code info records.
pub const CODE_KEY_PREFIX: u8 = 0x01;
/// Contract info records.
pub const CONTRACT_KEY_PREFIX: u8 = 0x02;
/// Contract storage namespaces.
pub const CONTRACT_STORE_PREFIX: u8 = 0x03;
/// Auto-increment sequences.
pub const SEQUENCE_KEY_PREFIX: u8 = 0x04;
/// Code history entries.
pub const CONTRACT_CODE_HISTORY_PREFIX: u8 = 0x05;
/// Secondary index from code id to contracts.
pub const CONTRACT_BY_CODE_PREFIX: u8 = 0x06;
/// Pinned code flags.
pub const PINNED_CODE_PREFIX: u8 = 0x07;
/// Module params.
pub const PARAMS_KEY: &[u8] = &[0x08];
/// Bank accounts.
pub const ACCOUNT_PREFIX: u8 = 0x10;
/// Bank balances.
pub const BALANCE_PREFIX: u8 = 0x11;
/// IBC port bindings.
pub const PORT_PREFIX: u8 = 0x12;

/// Sequence of the last assigned code id.
pub const KEY_LAST_CODE_ID: &[u8] = b"lastCodeId";
/// Sequence of the last assigned contract instance id.
pub const KEY_LAST_INSTANCE_ID: &[u8] = b"lastContractId";

fn prefixed(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.push(prefix);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

/// Key of a code info record.
#[must_use]
pub fn code_key(code_id: CodeId) -> Vec<u8> {
    prefixed(CODE_KEY_PREFIX, &[&code_id.to_be_bytes()])
}

/// Key of a contract info record.
#[must_use]
pub fn contract_key(addr: &Address) -> Vec<u8> {
    prefixed(CONTRACT_KEY_PREFIX, &[&addr.length_prefixed()])
}

/// Prefix of a contract's storage namespace.
#[must_use]
pub fn contract_store_prefix(addr: &Address) -> Vec<u8> {
    prefixed(CONTRACT_STORE_PREFIX, &[&addr.length_prefixed()])
}

/// Key of a named sequence.
#[must_use]
pub fn sequence_key(name: &[u8]) -> Vec<u8> {
    prefixed(SEQUENCE_KEY_PREFIX, &[name])
}

/// Prefix of a contract's code history.
#[must_use]
pub fn history_prefix(addr: &Address) -> Vec<u8> {
    prefixed(CONTRACT_CODE_HISTORY_PREFIX, &[&addr.length_prefixed()])
}

/// Key of a code history entry.
#[must_use]
pub fn history_key(addr: &Address, position: u64) -> Vec<u8> {
    prefixed(
        CONTRACT_CODE_HISTORY_PREFIX,
        &[&addr.length_prefixed(), &position.to_be_bytes()],
    )
}

/// Prefix of the contracts-by-code index for `code_id`.
#[must_use]
pub fn contracts_by_code_prefix(code_id: CodeId) -> Vec<u8> {
    prefixed(CONTRACT_BY_CODE_PREFIX, &[&code_id.to_be_bytes()])
}

/// Key of a contracts-by-code index entry.
#[must_use]
pub fn contract_by_code_key(code_id: CodeId, position: &AbsoluteTxPosition, addr: &Address) -> Vec<u8> {
    prefixed(
        CONTRACT_BY_CODE_PREFIX,
        &[&code_id.to_be_bytes(), &position.to_bytes(), addr.as_bytes()],
    )
}

/// Key of a pinned code flag.
#[must_use]
pub fn pinned_code_key(code_id: CodeId) -> Vec<u8> {
    prefixed(PINNED_CODE_PREFIX, &[&code_id.to_be_bytes()])
}

/// Key of a bank account.
#[must_use]
pub fn account_key(addr: &Address) -> Vec<u8> {
    prefixed(ACCOUNT_PREFIX, &[addr.as_bytes()])
}

/// Prefix of an account's balances.
#[must_use]
pub fn balance_prefix(addr: &Address) -> Vec<u8> {
    prefixed(BALANCE_PREFIX, &[&addr.length_prefixed()])
}

/// Key of a single balance.
#[must_use]
pub fn balance_key(addr: &Address, denom: &str) -> Vec<u8> {
    prefixed(BALANCE_PREFIX, &[&addr.length_prefixed(), denom.as_bytes()])
}

/// Key of a port binding.
#[must_use]
pub fn port_key(port_id: &str) -> Vec<u8> {
    prefixed(PORT_PREFIX, &[port_id.as_bytes()])
}

/// Reads a big-endian `u64` from the first eight bytes.
#[must_use]
pub fn read_u64(bytes: &[u8]) -> Option<u64> {
    bytes
        .get(..8)
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map(u64::from_be_bytes)
}
