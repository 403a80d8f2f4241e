//! # QC-WASM Contract Runtime - Host Side of Sandboxed Contracts
//!
//! **Crate:** `qc-wasm`
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Hosts sandboxed WASM smart contracts on top of a transactional key-value
//! ledger. Manages the contract lifecycle, charges ledger gas for engine work
//! and storage, dispatches the messages contracts return and serves queries
//! that contracts make of each other and of the ledger.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Setup gas is charged before the work it pays for | `keeper/lifecycle.rs` |
//! | Failed submessages leave no writes and no events | `keeper/dispatcher.rs` |
//! | Nested queries stop at `max_query_stack_size` | `keeper/query.rs` via `domain/invariants.rs` |
//! | Out of gas is fatal up to a submessage or query boundary | `errors.rs` - `WasmError::is_fatal()` |
//! | Errors shown to contracts carry only `(codespace, code)` | `errors.rs` - `redact_error()` |
//! | Contracts see only their own namespace | `keeper/backend.rs` |
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Gas register | `domain/gas.rs` | Cost model and VM gas conversion |
//! | Keeper | `keeper/` | Lifecycle, records, runtime gas |
//! | Dispatcher | `keeper/dispatcher.rs` | Submessages, replies, redaction |
//! | Query handler | `keeper/query.rs` | Routing and bounded recursion |
//! | State arena | `store/arena.rs` | Copy-on-write overlay scopes |
//! | VM adapter | `adapters/vm.rs` | Serialized engine access |
//! | Service | `service.rs` | Async facade over committed state |
//!
//! ## Outbound Dependencies
//!
//! | Module | Trait | Purpose |
//! |--------|-------|---------|
//! | Engine | `WasmEngine` | Compile, analyze, pin and call contracts |
//! | Auth | `AccountKeeper` | Contract accounts |
//! | Bank | `CoinTransferrer`, `BankView` | Funds and balance queries |
//! | IBC | `PortKeeper` | Port binding of IBC-capable contracts |
//! | Staking | `StakingView` | Staking queries |
//!
//! ## Usage Example
//!
//! ```ignore
//! use qc_wasm::prelude::*;
//!
//! let keeper = Keeper::builder(VmAdapter::new(engine)).build()?;
//! let service = WasmService::new(Arc::new(keeper), ServiceConfig::default());
//!
//! let code = service.store_code(creator.clone(), wasm, None).await?;
//! let (contract, _) = service
//!     .instantiate(creator, code.value.0, None, init_msg, "label".into(), vec![])
//!     .await?
//!     .value;
//! let answer = service.smart_query(contract, query_msg).await?;
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod events;
pub mod keeper;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod store;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        AccessConfig, AccessType, BlockInfo, CodeInfo, ContractCodeHistoryEntry,
        ContractCodeHistoryOperation, ContractInfo, Env, MessageInfo, Params,
    };

    // Messages
    pub use crate::domain::messages::{
        Attribute, BankMsg, CosmosMsg, Event, QueryRequest, Reply, ReplyOn, Response, SubMsg,
        SubMsgResult, WasmMsg, WasmQuery,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Binary, Checksum, Coin, CodeId};

    // Gas
    pub use crate::domain::gas::{Gas, GasRegister, GasRegisterConfig, WasmGasRegister};
    pub use crate::domain::gas_meter::GasMeter;

    // Domain services
    pub use crate::domain::services::{build_contract_address, checksum, uncompress};

    // Context and store
    pub use crate::context::{Context, EventManager};
    pub use crate::store::{KvStore, MemStore, StateArena};

    // Keeper
    pub use crate::keeper::{Keeper, KeeperBuilder, PermissionedKeeper, QueryPlugins};

    // Ports
    pub use crate::ports::inbound::{
        ContractHost, ContractOps, ContractQuerier, ContractViews, Replyer, TxOutcome, WasmApi,
    };
    pub use crate::ports::outbound::{AuthorizationPolicy, Backend, Messenger, WasmEngine};

    // Adapters
    pub use crate::adapters::{
        DefaultAuthorizationPolicy, GovAuthorizationPolicy, MockEngine, StoreBank, VmAdapter,
    };

    // Errors and config
    pub use crate::config::WasmConfig;
    pub use crate::errors::{SystemError, VmError, WasmError, WasmResult};

    // Service
    pub use crate::service::{ServiceConfig, ServiceStats, WasmService};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Subsystem ID for IPC.
pub const SUBSYSTEM_ID: u8 = 11;

/// Subsystem name.
pub const SUBSYSTEM_NAME: &str = "WASM Contracts";

// =============================================================================
// TESTS
// =============================================================================
