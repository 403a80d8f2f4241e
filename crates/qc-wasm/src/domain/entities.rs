//! # Core Domain Entities
//!
//! Persisted records and the call environment handed to contracts.

use crate::domain::value_objects::{Address, Checksum, Coin, CodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// ACCESS CONTROL
// =============================================================================

/// Permission kind without the bound address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// No one may act.
    Nobody,
    /// Only a single address may act.
    OnlyAddress,
    /// Anyone may act.
    Everybody,
}

impl AccessType {
    /// Binds the type to a concrete address.
    ///
    /// `OnlyAddress` becomes restricted to `addr`, the others are unchanged.
    #[must_use]
    pub fn with(self, addr: &Address) -> AccessConfig {
        match self {
            Self::Nobody => AccessConfig::Nobody,
            Self::OnlyAddress => AccessConfig::OnlyAddress(addr.clone()),
            Self::Everybody => AccessConfig::Everybody,
        }
    }
}

/// Who may upload or instantiate code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessConfig {
    /// No one.
    Nobody,
    /// A single address.
    OnlyAddress(Address),
    /// Anyone.
    Everybody,
}

impl AccessConfig {
    /// Returns true if `actor` is covered by this config.
    #[must_use]
    pub fn allowed(&self, actor: &Address) -> bool {
        match self {
            Self::Nobody => false,
            Self::OnlyAddress(addr) => addr == actor,
            Self::Everybody => true,
        }
    }

    /// Returns true if this config is not more permissive than `super_set`.
    #[must_use]
    pub fn is_subset(&self, super_set: &AccessConfig) -> bool {
        match super_set {
            Self::Everybody => true,
            Self::Nobody => matches!(self, Self::Nobody),
            Self::OnlyAddress(addr) => match self {
                Self::Nobody => true,
                Self::OnlyAddress(own) => own == addr,
                Self::Everybody => false,
            },
        }
    }

    /// The permission kind.
    #[must_use]
    pub fn access_type(&self) -> AccessType {
        match self {
            Self::Nobody => AccessType::Nobody,
            Self::OnlyAddress(_) => AccessType::OnlyAddress,
            Self::Everybody => AccessType::Everybody,
        }
    }
}

/// Module parameters, changeable by governance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Who may upload code.
    pub code_upload_access: AccessConfig,
    /// Default instantiate permission for new code, bound to the creator.
    pub instantiate_default_permission: AccessType,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            code_upload_access: AccessConfig::Everybody,
            instantiate_default_permission: AccessType::Everybody,
        }
    }
}

// =============================================================================
// CODE & CONTRACT RECORDS
// =============================================================================

/// Stored code metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInfo {
    /// Engine checksum of the uncompressed code.
    pub code_hash: Checksum,
    /// Uploader.
    pub creator: Address,
    /// Who may instantiate this code.
    pub instantiate_config: AccessConfig,
}

/// Block position of a state change; orders history and index entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbsoluteTxPosition {
    /// Block height.
    pub block_height: u64,
    /// Transaction index within the block.
    pub tx_index: u64,
}

impl AbsoluteTxPosition {
    /// Length of [`Self::to_bytes`].
    pub const LEN: usize = 16;

    /// Big-endian encoding so that byte order equals numeric order.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.block_height.to_be_bytes());
        out[8..].copy_from_slice(&self.tx_index.to_be_bytes());
        out
    }
}

/// Stored contract metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    /// Code currently backing the contract.
    pub code_id: CodeId,
    /// Instantiator.
    pub creator: Address,
    /// Account allowed to migrate and change the admin.
    pub admin: Option<Address>,
    /// Human readable label.
    pub label: String,
    /// Where the contract was instantiated.
    pub created: AbsoluteTxPosition,
    /// Bound IBC port, if the code has IBC entry points.
    pub ibc_port_id: Option<String>,
    /// Opaque chain specific extension, encoded by its owner.
    pub extension: Option<Vec<u8>>,
}

impl ContractInfo {
    /// Creates a record without port or extension.
    #[must_use]
    pub fn new(
        code_id: CodeId,
        creator: Address,
        admin: Option<Address>,
        label: impl Into<String>,
        created: AbsoluteTxPosition,
    ) -> Self {
        Self {
            code_id,
            creator,
            admin,
            label: label.into(),
            created,
            ibc_port_id: None,
            extension: None,
        }
    }

    /// History entry for the instantiation of this contract.
    #[must_use]
    pub fn initial_history(&self, msg: &[u8]) -> ContractCodeHistoryEntry {
        ContractCodeHistoryEntry {
            operation: ContractCodeHistoryOperation::Init,
            code_id: self.code_id,
            updated: self.created,
            msg: msg.to_vec(),
        }
    }

    /// Switches to `new_code_id` and returns the matching history entry.
    pub fn add_migration(
        &mut self,
        new_code_id: CodeId,
        updated: AbsoluteTxPosition,
        msg: &[u8],
    ) -> ContractCodeHistoryEntry {
        self.code_id = new_code_id;
        ContractCodeHistoryEntry {
            operation: ContractCodeHistoryOperation::Migrate,
            code_id: new_code_id,
            updated,
            msg: msg.to_vec(),
        }
    }
}

/// Kind of code change recorded in the history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCodeHistoryOperation {
    /// Imported at genesis.
    Genesis,
    /// Instantiated.
    Init,
    /// Migrated to new code.
    Migrate,
}

/// One element of a contract's code history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCodeHistoryEntry {
    /// What happened.
    pub operation: ContractCodeHistoryOperation,
    /// Code after the operation.
    pub code_id: CodeId,
    /// When it happened.
    pub updated: AbsoluteTxPosition,
    /// Message passed to the contract.
    pub msg: Vec<u8>,
}

/// Outcome of code analysis by the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    /// True if the code exports the IBC channel entry points.
    pub has_ibc_entry_points: bool,
    /// Capabilities the code requires from the host.
    pub required_features: BTreeSet<String>,
}

// =============================================================================
// CALL ENVIRONMENT
// =============================================================================

/// Block data visible to the runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block height.
    pub height: u64,
    /// Block time in nanoseconds since the epoch.
    pub time_nanos: u64,
    /// Chain identifier.
    pub chain_id: String,
    /// Index of the current transaction in the block.
    pub tx_index: u64,
}

impl BlockInfo {
    /// Creates block info.
    #[must_use]
    pub fn new(height: u64, time_nanos: u64, chain_id: impl Into<String>) -> Self {
        Self {
            height,
            time_nanos,
            chain_id: chain_id.into(),
            tx_index: 0,
        }
    }

    /// Same block, different transaction index.
    #[must_use]
    pub fn with_tx_index(mut self, tx_index: u64) -> Self {
        self.tx_index = tx_index;
        self
    }

    /// Position of the current transaction.
    #[must_use]
    pub fn position(&self) -> AbsoluteTxPosition {
        AbsoluteTxPosition {
            block_height: self.height,
            tx_index: self.tx_index,
        }
    }
}

/// Environment passed into every contract call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    /// Current block.
    pub block: BlockInfo,
    /// Address of the called contract.
    pub contract_address: String,
}

impl Env {
    /// Environment for a call into `contract`.
    #[must_use]
    pub fn new(block: &BlockInfo, contract: &Address) -> Self {
        Self {
            block: block.clone(),
            contract_address: contract.to_string(),
        }
    }
}

/// Sender and funds of an execute or instantiate call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Calling account.
    pub sender: String,
    /// Funds sent along.
    pub funds: Vec<Coin>,
}

impl MessageInfo {
    /// Creates message info.
    #[must_use]
    pub fn new(sender: &Address, funds: &[Coin]) -> Self {
        Self {
            sender: sender.to_string(),
            funds: funds.to_vec(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
