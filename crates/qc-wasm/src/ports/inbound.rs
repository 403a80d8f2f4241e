//! # Driving Ports (API - Inbound)
//!
//! Interfaces the runtime exposes.
//!
//! | Trait | Caller | Implemented by |
//! |-------|--------|----------------|
//! | `ContractOps` | transaction handlers, governance | `PermissionedKeeper` |
//! | `ContractHost` | messengers re-entering the runtime | `Keeper` (default policy) |
//! | `Replyer` | message dispatcher | `Keeper` |
//! | `ContractQuerier` | query plugins | `Keeper` |
//! | `WasmApi` | hosts driving whole transactions | `WasmService` |

use crate::context::Context;
use crate::domain::entities::{AccessConfig, CodeInfo, ContractCodeHistoryEntry, ContractInfo};
use crate::domain::gas::Gas;
use crate::domain::messages::{ContractInfoResponse, Event, Reply};
use crate::domain::value_objects::{Address, Binary, Checksum, Coin, CodeId};
use crate::errors::WasmResult;
use async_trait::async_trait;

// =============================================================================
// CALLBACKS
// =============================================================================

/// Delivers a reply to the contract that issued a submessage.
pub trait Replyer {
    /// Calls the `reply` entry point of `contract`; returns data that
    /// overrides the caller's result when set.
    fn reply(&self, ctx: &mut Context<'_>, contract: &Address, reply: &Reply) -> WasmResult<Option<Binary>>;
}

/// Contract operations a messenger may trigger on behalf of a contract.
pub trait ContractHost: Replyer {
    /// Instantiates `code_id` with `creator` as sender.
    #[allow(clippy::too_many_arguments)]
    fn instantiate(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        creator: &Address,
        admin: Option<&Address>,
        msg: &[u8],
        label: &str,
        funds: &[Coin],
    ) -> WasmResult<(Address, Option<Binary>)>;

    /// Executes `contract` with `caller` as sender.
    fn execute(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        msg: &[u8],
        funds: &[Coin],
    ) -> WasmResult<Option<Binary>>;

    /// Migrates `contract` to `new_code_id`.
    fn migrate(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_code_id: CodeId,
        msg: &[u8],
    ) -> WasmResult<Option<Binary>>;

    /// Sets or clears (`None`) the admin of `contract`.
    fn update_admin(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_admin: Option<&Address>,
    ) -> WasmResult<()>;
}

/// Contract reads offered to query plugins.
pub trait ContractQuerier {
    /// Calls the `query` entry point of `contract`.
    fn query_smart(&self, ctx: &mut Context<'_>, contract: &Address, req: &[u8]) -> WasmResult<Vec<u8>>;

    /// Raw value at `key` of the contract namespace.
    fn query_raw(&self, ctx: &Context<'_>, contract: &Address, key: &[u8]) -> WasmResult<Option<Vec<u8>>>;

    /// Public contract metadata, `None` if there is no contract at `contract`.
    fn contract_info_response(
        &self,
        ctx: &Context<'_>,
        contract: &Address,
    ) -> WasmResult<Option<ContractInfoResponse>>;
}

// =============================================================================
// LIFECYCLE API
// =============================================================================

/// Externally callable lifecycle operations, checked by an authorization policy.
pub trait ContractOps {
    /// Uploads code. Returns the new code id and its checksum.
    fn create(
        &self,
        ctx: &mut Context<'_>,
        creator: &Address,
        wasm: &[u8],
        instantiate_permission: Option<&AccessConfig>,
    ) -> WasmResult<(CodeId, Checksum)>;

    /// Instantiates a contract.
    #[allow(clippy::too_many_arguments)]
    fn instantiate(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        creator: &Address,
        admin: Option<&Address>,
        init_msg: &[u8],
        label: &str,
        funds: &[Coin],
    ) -> WasmResult<(Address, Option<Binary>)>;

    /// Executes a contract.
    fn execute(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        msg: &[u8],
        funds: &[Coin],
    ) -> WasmResult<Option<Binary>>;

    /// Migrates a contract to new code.
    fn migrate(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_code_id: CodeId,
        msg: &[u8],
    ) -> WasmResult<Option<Binary>>;

    /// Privileged entry point. Callers are gated by the ledger, not the policy.
    fn sudo(&self, ctx: &mut Context<'_>, contract: &Address, msg: &[u8]) -> WasmResult<Option<Binary>>;

    /// Replaces the admin.
    fn update_contract_admin(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_admin: &Address,
    ) -> WasmResult<()>;

    /// Removes the admin.
    fn clear_contract_admin(&self, ctx: &mut Context<'_>, contract: &Address, caller: &Address) -> WasmResult<()>;

    /// Pins code in the engine cache.
    fn pin_code(&self, ctx: &mut Context<'_>, code_id: CodeId) -> WasmResult<()>;

    /// Unpins code from the engine cache.
    fn unpin_code(&self, ctx: &mut Context<'_>, code_id: CodeId) -> WasmResult<()>;

    /// Replaces the opaque extension of a contract record.
    fn set_contract_info_extension(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        extension: Option<Vec<u8>>,
    ) -> WasmResult<()>;

    /// Narrows the instantiate permission of stored code.
    fn set_access_config(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        caller: &Address,
        config: AccessConfig,
    ) -> WasmResult<()>;
}

/// Read-only views over stored records.
pub trait ContractViews {
    /// Contract record.
    fn get_contract_info(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<Option<ContractInfo>>;

    /// Code record.
    fn get_code_info(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Option<CodeInfo>>;

    /// Code history, oldest first.
    fn get_contract_history(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<Vec<ContractCodeHistoryEntry>>;

    /// Contracts currently running `code_id`, in instantiation or migration order.
    fn contracts_by_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Vec<Address>>;

    /// Whether `code_id` is pinned.
    fn is_pinned_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<bool>;
}

// =============================================================================
// ASYNC FACADE
// =============================================================================

/// Result of a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutcome<T> {
    /// What the operation returned.
    pub value: T,
    /// Ledger gas consumed, setup costs included.
    pub gas_used: Gas,
    /// Events in emission order.
    pub events: Vec<Event>,
}

/// Whole transactions and top-level queries against committed state.
///
/// Every transaction either commits all its writes or none.
#[async_trait]
pub trait WasmApi: Send + Sync {
    /// Uploads code as `sender`.
    async fn store_code(
        &self,
        sender: Address,
        wasm: Vec<u8>,
        instantiate_permission: Option<AccessConfig>,
    ) -> WasmResult<TxOutcome<(CodeId, Checksum)>>;

    /// Instantiates `code_id` as `sender`.
    #[allow(clippy::too_many_arguments)]
    async fn instantiate(
        &self,
        sender: Address,
        code_id: CodeId,
        admin: Option<Address>,
        msg: Vec<u8>,
        label: String,
        funds: Vec<Coin>,
    ) -> WasmResult<TxOutcome<(Address, Option<Binary>)>>;

    /// Executes `contract` as `sender`.
    async fn execute(
        &self,
        sender: Address,
        contract: Address,
        msg: Vec<u8>,
        funds: Vec<Coin>,
    ) -> WasmResult<TxOutcome<Option<Binary>>>;

    /// Migrates `contract` as `sender`.
    async fn migrate(
        &self,
        sender: Address,
        contract: Address,
        new_code_id: CodeId,
        msg: Vec<u8>,
    ) -> WasmResult<TxOutcome<Option<Binary>>>;

    /// Smart query with the configured query gas limit. Never commits.
    async fn smart_query(&self, contract: Address, msg: Vec<u8>) -> WasmResult<Vec<u8>>;

    /// Raw value of a contract key.
    async fn raw_query(&self, contract: Address, key: Vec<u8>) -> WasmResult<Option<Vec<u8>>>;
}
