//! # Test Fixtures
//!
//! Contracts written against the mock engine, and a harness that runs the
//! keeper over an in-memory store.
//!
//! | Contract | Code | Behavior |
//! |----------|------|----------|
//! | `Depositor` | `DEPOSITOR_WASM` | custom event plus bank send with reply |
//! | `Reflect` | `REFLECT_WASM` | dispatches the submessages it is given |
//! | `Flaky` | `FLAKY_WASM` | writes, then fails or burns gas on request |
//! | `Recurser` | `RECURSER_WASM` | queries itself `depth` times |
//! | `Counter` | `COUNTER_WASM` | keeps a number |

use qc_wasm::adapters::mock_engine::{ContractLogic, Deps, MockEngine, MockGasCosts};
use qc_wasm::adapters::{DefaultAuthorizationPolicy, StoreBank, VmAdapter};
use qc_wasm::config::WasmConfig;
use qc_wasm::context::{Context, EventManager};
use qc_wasm::domain::entities::{BlockInfo, Env, MessageInfo};
use qc_wasm::domain::gas_meter::GasMeter;
use qc_wasm::domain::messages::{
    BankMsg, Event, QueryRequest, Reply, Response, SubMsg, WasmMsg, WasmQuery,
};
use qc_wasm::domain::value_objects::{Address, Binary, Coin, CodeId};
use qc_wasm::errors::VmError;
use qc_wasm::keeper::Keeper;
use qc_wasm::ports::outbound::BankView;
use qc_wasm::store::{MemStore, StateArena};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Staking denom used throughout the suite.
pub const DENOM: &str = "ustake";

/// Code bytes of [`Depositor`].
pub const DEPOSITOR_WASM: &[u8] = b"\0asm-depositor";
/// Code bytes of [`Reflect`].
pub const REFLECT_WASM: &[u8] = b"\0asm-reflect";
/// Code bytes of [`Flaky`].
pub const FLAKY_WASM: &[u8] = b"\0asm-flaky";
/// Code bytes of [`Recurser`].
pub const RECURSER_WASM: &[u8] = b"\0asm-recurser";
/// Code bytes of [`Counter`].
pub const COUNTER_WASM: &[u8] = b"\0asm-counter";

/// Storage key under which [`Depositor`] keeps the last reply.
pub const LAST_REPLY_KEY: &[u8] = b"last_reply";

fn contract_err(err: impl std::fmt::Display) -> VmError {
    VmError::Contract(err.to_string())
}

// =============================================================================
// CONTRACTS
// =============================================================================

/// Execute message of [`Depositor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutMsg {
    /// Bech32 recipient.
    pub recipient: String,
    /// Amount of [`DENOM`] to send.
    pub amount: u128,
}

/// The custom event [`Depositor`] emits on every payout.
pub fn payout_event() -> Event {
    Event::new("payout").add_attribute("hello", "world!")
}

/// Accepts deposits at instantiation and pays out on execute.
pub struct Depositor;

impl ContractLogic for Depositor {
    fn instantiate(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, _msg: &[u8]) -> Result<Response, VmError> {
        Ok(Response::new())
    }

    fn execute(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, msg: &[u8]) -> Result<Response, VmError> {
        let payout: PayoutMsg = serde_json::from_slice(msg).map_err(contract_err)?;
        let send = BankMsg::Send {
            to_address: payout.recipient,
            amount: vec![Coin::new(payout.amount, DENOM)],
        };
        Ok(Response::new()
            .add_event(payout_event())
            .add_submessage(SubMsg::reply_always(send, 1)))
    }

    fn reply(&self, deps: &mut Deps<'_>, _env: &Env, reply: &Reply) -> Result<Response, VmError> {
        let raw = serde_json::to_vec(reply).map_err(contract_err)?;
        deps.set(LAST_REPLY_KEY, &raw)?;
        Ok(Response::new())
    }
}

/// Dispatches whatever submessages it is told to.
///
/// `execute` takes a JSON list of submessages. `reply` stores the reply under
/// `reply:<id>` and answers with that key as data.
pub struct Reflect;

impl ContractLogic for Reflect {
    fn instantiate(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, _msg: &[u8]) -> Result<Response, VmError> {
        Ok(Response::new())
    }

    fn execute(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, msg: &[u8]) -> Result<Response, VmError> {
        let messages: Vec<SubMsg> = serde_json::from_slice(msg).map_err(contract_err)?;
        Ok(Response {
            messages,
            ..Response::default()
        })
    }

    fn reply(&self, deps: &mut Deps<'_>, _env: &Env, reply: &Reply) -> Result<Response, VmError> {
        let key = reply_key(reply.id);
        let raw = serde_json::to_vec(reply).map_err(contract_err)?;
        deps.set(&key, &raw)?;
        Ok(Response::new().set_data(key))
    }
}

/// Storage key of the reply with `id` in a [`Reflect`] contract.
pub fn reply_key(id: u64) -> Vec<u8> {
    format!("reply:{id}").into_bytes()
}

/// Writes a marker and then does what it is told.
///
/// - `write`: keep the marker
/// - `write_then_fail`: return an error
/// - `burn`: burn all gas in one charge
/// - `spin`: keep writing until gas runs out
pub struct Flaky;

/// Storage key written by [`Flaky`].
pub const TOUCHED_KEY: &[u8] = b"touched";

impl ContractLogic for Flaky {
    fn instantiate(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, _msg: &[u8]) -> Result<Response, VmError> {
        Ok(Response::new())
    }

    fn execute(&self, deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, msg: &[u8]) -> Result<Response, VmError> {
        deps.set(TOUCHED_KEY, b"yes")?;
        match msg {
            b"write" => Ok(Response::new().add_attribute("action", "write")),
            b"write_then_fail" => Err(VmError::Contract("flaky failure".into())),
            b"burn" => {
                deps.charge(u64::MAX)?;
                Ok(Response::new())
            }
            b"spin" => {
                for i in 0u64.. {
                    deps.set(&i.to_be_bytes(), b"x")?;
                }
                Ok(Response::new())
            }
            _ => Err(VmError::Contract("unknown flaky command".into())),
        }
    }
}

/// Query message of [`Recurser`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthQuery {
    /// Remaining self-queries.
    pub depth: u32,
}

/// Queries itself until `depth` reaches zero.
pub struct Recurser;

impl ContractLogic for Recurser {
    fn instantiate(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, _msg: &[u8]) -> Result<Response, VmError> {
        Ok(Response::new())
    }

    fn query(&self, deps: &mut Deps<'_>, env: &Env, msg: &[u8]) -> Result<Vec<u8>, VmError> {
        let query: DepthQuery = serde_json::from_slice(msg).map_err(contract_err)?;
        if query.depth == 0 {
            return Ok(b"bottom".to_vec());
        }
        let next = DepthQuery {
            depth: query.depth - 1,
        };
        let request = QueryRequest::Wasm(WasmQuery::Smart {
            contract_addr: env.contract_address.clone(),
            msg: Binary::from(serde_json::to_vec(&next).map_err(contract_err)?),
        });
        deps.query(&request)
    }
}

/// Keeps a number under `count`.
pub struct Counter;

fn read_count(deps: &mut Deps<'_>) -> Result<u64, VmError> {
    let raw = deps.get(b"count")?.unwrap_or_else(|| b"0".to_vec());
    String::from_utf8_lossy(&raw).parse().map_err(contract_err)
}

impl ContractLogic for Counter {
    fn instantiate(&self, deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, _msg: &[u8]) -> Result<Response, VmError> {
        deps.set(b"count", b"0")?;
        Ok(Response::new())
    }

    fn execute(&self, deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, _msg: &[u8]) -> Result<Response, VmError> {
        let next = read_count(deps)? + 1;
        deps.set(b"count", next.to_string().as_bytes())?;
        Ok(Response::new().add_attribute("count", next.to_string()))
    }

    fn query(&self, deps: &mut Deps<'_>, _env: &Env, _msg: &[u8]) -> Result<Vec<u8>, VmError> {
        let count = read_count(deps)?;
        Ok(count.to_string().into_bytes())
    }
}

/// Engine with every fixture contract registered.
pub fn engine(costs: MockGasCosts) -> MockEngine {
    let engine = MockEngine::with_costs(costs);
    engine.register(DEPOSITOR_WASM, Depositor);
    engine.register(REFLECT_WASM, Reflect);
    engine.register(FLAKY_WASM, Flaky);
    engine.register(RECURSER_WASM, Recurser);
    engine.register(COUNTER_WASM, Counter);
    engine
}

/// Builds a keeper over `engine`.
pub fn keeper(engine: MockEngine, config: WasmConfig) -> Arc<Keeper> {
    let keeper = Keeper::builder(VmAdapter::new(engine))
        .with_config(config)
        .build()
        .expect("valid keeper config");
    Arc::new(keeper)
}

/// Execute message for [`Reflect`].
pub fn reflect_msg(messages: &[SubMsg]) -> Vec<u8> {
    serde_json::to_vec(messages).expect("submessages serialize")
}

/// Wasm execute message aimed at `contract`.
pub fn execute_msg(contract: &Address, msg: &[u8]) -> WasmMsg {
    WasmMsg::Execute {
        contract_addr: contract.to_string(),
        msg: Binary::from(msg),
        funds: Vec::new(),
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// A keeper with its own store, meter and event sink.
pub struct Harness {
    /// The keeper under test.
    pub keeper: Arc<Keeper>,
    /// Transaction state.
    pub arena: StateArena,
    /// Meter of the current call.
    pub meter: GasMeter,
    /// Events of the current call.
    pub events: EventManager,
    /// Block environment.
    pub block: BlockInfo,
    /// Funded account used as sender.
    pub creator: Address,
}

impl Harness {
    /// Harness whose engine charges no VM gas, so that every charge comes
    /// from the cost model.
    pub fn new() -> Self {
        Self::with(MockGasCosts::free(), WasmConfig::default())
    }

    /// Harness with explicit engine costs and runtime config.
    pub fn with(costs: MockGasCosts, config: WasmConfig) -> Self {
        let mut harness = Self {
            keeper: keeper(engine(costs), config),
            arena: StateArena::new(Box::new(MemStore::new())),
            meter: GasMeter::new(50_000_000),
            events: EventManager::new(),
            block: BlockInfo::new(1, 1_000, "qc-tests"),
            creator: Address::new(vec![1; 20]),
        };
        let creator = harness.creator.clone();
        harness.fund(&creator, 1_000_000);
        harness
    }

    /// Context over the harness state.
    pub fn ctx(&mut self) -> Context<'_> {
        Context::new(&mut self.arena, &mut self.meter, &mut self.events, &self.block)
    }

    /// Fresh meter and event sink for the next call.
    pub fn reset(&mut self, gas_limit: u64) {
        self.meter = GasMeter::new(gas_limit);
        self.events = EventManager::new();
    }

    /// Uploads `wasm` as the creator.
    pub fn store(&mut self, wasm: &[u8]) -> CodeId {
        let keeper = Arc::clone(&self.keeper);
        let creator = self.creator.clone();
        keeper
            .create(&mut self.ctx(), &creator, wasm, None, &DefaultAuthorizationPolicy)
            .expect("code upload")
            .0
    }

    /// Uploads and instantiates `wasm` with `deposit` units of [`DENOM`].
    pub fn deploy(&mut self, wasm: &[u8], deposit: u128) -> Address {
        let code_id = self.store(wasm);
        let keeper = Arc::clone(&self.keeper);
        let creator = self.creator.clone();
        let funds = if deposit == 0 {
            Vec::new()
        } else {
            vec![Coin::new(deposit, DENOM)]
        };
        keeper
            .instantiate(
                &mut self.ctx(),
                code_id,
                &creator,
                None,
                b"{}",
                "fixture",
                &funds,
                &DefaultAuthorizationPolicy,
            )
            .expect("instantiate")
            .0
    }

    /// Executes `contract` as the creator.
    pub fn execute(&mut self, contract: &Address, msg: &[u8]) -> qc_wasm::errors::WasmResult<Option<Binary>> {
        let keeper = Arc::clone(&self.keeper);
        let creator = self.creator.clone();
        keeper.execute(&mut self.ctx(), contract, &creator, msg, &[])
    }

    /// Raw contract storage.
    pub fn raw(&mut self, contract: &Address, key: &[u8]) -> Option<Vec<u8>> {
        let keeper = Arc::clone(&self.keeper);
        keeper.query_raw(&self.ctx(), contract, key).expect("raw query")
    }

    /// Mints `amount` units of [`DENOM`] to `addr`.
    pub fn fund(&mut self, addr: &Address, amount: u128) {
        StoreBank::new()
            .mint(&mut self.ctx(), addr, &[Coin::new(amount, DENOM)])
            .expect("mint");
    }

    /// Balance of `addr` in [`DENOM`].
    pub fn balance(&mut self, addr: &Address) -> u128 {
        StoreBank::new()
            .balance(&self.ctx(), addr, DENOM)
            .expect("balance")
            .amount
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
