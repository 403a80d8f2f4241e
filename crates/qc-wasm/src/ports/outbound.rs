//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces the runtime depends on. Adapters implement these traits to
//! provide:
//! - the contract engine and the host callbacks it sees (`WasmEngine`, `Backend`)
//! - delivery of contract messages (`Messenger`)
//! - the ledger modules the keeper touches (accounts, bank, ports, staking)
//! - the authorization strategy (`AuthorizationPolicy`)
//!
//! Everything here is synchronous. Ledger state is reached through the
//! [`Context`] handed to each call, never through state held by the adapter.

use crate::context::Context;
use crate::domain::entities::{AccessConfig, AnalysisReport, Env, MessageInfo};
use crate::domain::messages::{CosmosMsg, Event, QueryRequest, Reply, Response, Validator};
use crate::domain::value_objects::{Address, Binary, Checksum, Coin};
use crate::errors::{QuerierError, SystemError, VmError, WasmResult};
use crate::ports::inbound::ContractHost;
use crate::store::{KvPair, Order};
use std::fmt;

// =============================================================================
// ENGINE
// =============================================================================

/// Result of an engine entry point together with the VM gas it burned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmOutput<T> {
    /// Contract result or engine failure.
    pub result: Result<T, VmError>,
    /// VM gas used, including on failure.
    pub gas_used: u64,
}

impl<T> VmOutput<T> {
    /// Successful output.
    #[must_use]
    pub fn ok(value: T, gas_used: u64) -> Self {
        Self {
            result: Ok(value),
            gas_used,
        }
    }

    /// Failed output.
    #[must_use]
    pub fn err(error: VmError, gas_used: u64) -> Self {
        Self {
            result: Err(error),
            gas_used,
        }
    }
}

/// Contract storage seen by the engine, confined to one contract's namespace.
pub trait Storage {
    /// Value at `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VmError>;

    /// Writes `key`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError>;

    /// Removes `key`.
    fn remove(&mut self, key: &[u8]) -> Result<(), VmError>;

    /// Pairs in `[start, end)`.
    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Result<Vec<KvPair>, VmError>;
}

/// Queries a contract issues while it runs.
pub trait Querier {
    /// Runs `request` with at most `gas_limit` VM gas.
    fn query(&mut self, request: &QueryRequest, gas_limit: u64) -> Result<Vec<u8>, QuerierError>;

    /// Parses the JSON request first; parse failures are system errors.
    fn query_raw(&mut self, request: &[u8], gas_limit: u64) -> Result<Vec<u8>, QuerierError> {
        let parsed: QueryRequest = serde_json::from_slice(request).map_err(|e| {
            SystemError::InvalidRequest {
                error: e.to_string(),
                request: String::from_utf8_lossy(request).into_owned(),
            }
        })?;
        self.query(&parsed, gas_limit)
    }
}

/// Everything the host offers the engine during one call.
pub trait Backend: Storage + Querier {
    /// Ledger gas consumed so far by the calling context, in VM units.
    fn gas_consumed(&self) -> u64;
}

/// The sandboxed contract engine.
///
/// Methods take `&self`: the adapter serializes access, implementations keep
/// their caches behind interior mutability.
pub trait WasmEngine: Send {
    /// Compiles and stores code, returning its checksum.
    fn create(&self, code: &[u8]) -> Result<Checksum, VmError>;

    /// Static analysis of stored code.
    fn analyze_code(&self, checksum: &Checksum) -> Result<AnalysisReport, VmError>;

    /// Stored code bytes.
    fn get_code(&self, checksum: &Checksum) -> Result<Vec<u8>, VmError>;

    /// Keeps the code instance in memory.
    fn pin(&self, checksum: &Checksum) -> Result<(), VmError>;

    /// Releases a pinned instance.
    fn unpin(&self, checksum: &Checksum) -> Result<(), VmError>;

    /// `instantiate` entry point.
    fn instantiate(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response>;

    /// `execute` entry point.
    fn execute(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response>;

    /// `migrate` entry point.
    fn migrate(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response>;

    /// `sudo` entry point.
    fn sudo(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response>;

    /// `reply` entry point.
    fn reply(
        &self,
        checksum: &Checksum,
        env: &Env,
        reply: &Reply,
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response>;

    /// `query` entry point.
    fn query(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Vec<u8>>;
}

// =============================================================================
// MESSAGE DELIVERY
// =============================================================================

/// What a delivered message produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutput {
    /// Events returned by the handler, in addition to those emitted on the context.
    pub events: Vec<Event>,
    /// Data outputs; the first one is reported to a reply.
    pub data: Vec<Binary>,
}

/// Delivers a contract message to the ledger module that handles it.
pub trait Messenger: Send + Sync {
    /// Runs `msg` on behalf of `contract`.
    ///
    /// Wasm messages re-enter the runtime through `host`.
    fn dispatch_msg(
        &self,
        ctx: &mut Context<'_>,
        host: &dyn ContractHost,
        contract: &Address,
        ibc_port: Option<&str>,
        msg: &CosmosMsg,
    ) -> WasmResult<DispatchOutput>;
}

// =============================================================================
// LEDGER MODULES
// =============================================================================

/// Account registry.
pub trait AccountKeeper: Send + Sync {
    /// Returns true if an account exists at `addr`.
    fn has_account(&self, ctx: &Context<'_>, addr: &Address) -> WasmResult<bool>;

    /// Creates an empty account at `addr`.
    fn new_account(&self, ctx: &mut Context<'_>, addr: &Address) -> WasmResult<()>;
}

/// Moves coins between accounts.
pub trait CoinTransferrer: Send + Sync {
    /// Transfers `amount` and returns the bank events describing it.
    fn transfer_coins(
        &self,
        ctx: &mut Context<'_>,
        from: &Address,
        to: &Address,
        amount: &[Coin],
    ) -> WasmResult<Vec<Event>>;
}

/// Read access to balances.
pub trait BankView: Send + Sync {
    /// Balance of one denom, zero if none.
    fn balance(&self, ctx: &Context<'_>, addr: &Address, denom: &str) -> WasmResult<Coin>;

    /// All non-zero balances ordered by denom.
    fn all_balances(&self, ctx: &Context<'_>, addr: &Address) -> WasmResult<Vec<Coin>>;
}

/// IBC port registry.
pub trait PortKeeper: Send + Sync {
    /// Returns true if `port_id` is bound.
    fn is_bound(&self, ctx: &Context<'_>, port_id: &str) -> WasmResult<bool>;

    /// Binds `port_id` to `owner`.
    fn bind_port(&self, ctx: &mut Context<'_>, port_id: &str, owner: &Address) -> WasmResult<()>;
}

/// Read access to the validator set.
pub trait StakingView: Send + Sync {
    /// Denom used for staking.
    fn bonded_denom(&self) -> String;

    /// Active validators.
    fn all_validators(&self) -> Vec<Validator>;

    /// Validator by operator address.
    fn validator(&self, address: &str) -> Option<Validator>;
}

// =============================================================================
// AUTHORIZATION
// =============================================================================

/// Decides who may upload, instantiate and administer contracts.
pub trait AuthorizationPolicy: Send + Sync + fmt::Debug {
    /// May `actor` upload code under `upload_access`?
    fn can_create_code(&self, upload_access: &AccessConfig, actor: &Address) -> bool;

    /// May `actor` instantiate code with `config`?
    fn can_instantiate_contract(&self, config: &AccessConfig, actor: &Address) -> bool;

    /// May `actor` migrate or re-admin a contract administered by `admin`?
    fn can_modify_contract(&self, admin: Option<&Address>, actor: &Address) -> bool;

    /// May `actor` change the instantiate permission of code uploaded by
    /// `creator`? `is_subset` tells whether the new config narrows the
    /// default one.
    fn can_modify_code_access_config(&self, creator: &Address, actor: &Address, is_subset: bool) -> bool;
}
