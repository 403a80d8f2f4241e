//! Shared fixture for keeper unit tests.

use super::Keeper;
use crate::adapters::authz::DefaultAuthorizationPolicy;
use crate::adapters::bank::StoreBank;
use crate::adapters::mock_engine::{ContractLogic, Deps, MockEngine};
use crate::adapters::vm::VmAdapter;
use crate::config::WasmConfig;
use crate::context::{Context, EventManager};
use crate::domain::entities::{BlockInfo, Env, MessageInfo};
use crate::domain::gas_meter::GasMeter;
use crate::domain::messages::{QueryRequest, Reply, Response, SubMsg};
use crate::domain::value_objects::{Address, Coin, CodeId};
use crate::errors::VmError;
use crate::ports::outbound::BankView;
use crate::store::{MemStore, StateArena};
use std::sync::Arc;

pub(crate) const COUNTER_WASM: &[u8] = b"\0asm-counter";
pub(crate) const REFLECT_WASM: &[u8] = b"\0asm-reflect";
pub(crate) const DENOM: &str = "ustake";

/// Keeps a number under `count`.
///
/// `instantiate` takes `{"count": n}`; `execute` understands `increment`,
/// `fail` and `burn` (exhausts its gas).
pub(crate) struct Counter;

fn read_count(deps: &mut Deps<'_>) -> Result<u64, VmError> {
    let raw = deps.get(b"count")?.unwrap_or_else(|| b"0".to_vec());
    String::from_utf8_lossy(&raw)
        .parse()
        .map_err(|_| VmError::Contract("corrupt count".into()))
}

impl ContractLogic for Counter {
    fn instantiate(&self, deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, msg: &[u8]) -> Result<Response, VmError> {
        let init: serde_json::Value =
            serde_json::from_slice(msg).map_err(|e| VmError::Contract(e.to_string()))?;
        let count = init["count"].as_u64().unwrap_or(0);
        deps.set(b"count", count.to_string().as_bytes())?;
        Ok(Response::new().add_attribute("action", "instantiate"))
    }

    fn execute(&self, deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, msg: &[u8]) -> Result<Response, VmError> {
        match msg {
            b"increment" => {
                let next = read_count(deps)? + 1;
                deps.set(b"count", next.to_string().as_bytes())?;
                Ok(Response::new().add_attribute("action", "increment"))
            }
            b"burn" => {
                deps.set(b"count", b"burned")?;
                deps.charge(u64::MAX)?;
                Ok(Response::new())
            }
            _ => Err(VmError::Contract("counter failed".into())),
        }
    }

    fn migrate(&self, _deps: &mut Deps<'_>, _env: &Env, _msg: &[u8]) -> Result<Response, VmError> {
        Ok(Response::new())
    }

    fn query(&self, deps: &mut Deps<'_>, _env: &Env, _msg: &[u8]) -> Result<Vec<u8>, VmError> {
        let count = read_count(deps)?;
        Ok(serde_json::json!({ "count": count }).to_string().into_bytes())
    }
}

/// Returns whatever submessages it is told to.
///
/// `execute` takes a JSON list of submessages, `query` a JSON query request it
/// forwards, and `reply` records the outcome and answers with `reply:<id>`.
pub(crate) struct Reflect;

impl ContractLogic for Reflect {
    fn instantiate(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, _msg: &[u8]) -> Result<Response, VmError> {
        Ok(Response::new())
    }

    fn execute(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, msg: &[u8]) -> Result<Response, VmError> {
        let messages: Vec<SubMsg> =
            serde_json::from_slice(msg).map_err(|e| VmError::Contract(e.to_string()))?;
        Ok(Response {
            messages,
            ..Response::default()
        })
    }

    fn migrate(&self, _deps: &mut Deps<'_>, _env: &Env, _msg: &[u8]) -> Result<Response, VmError> {
        Ok(Response::new())
    }

    fn reply(&self, deps: &mut Deps<'_>, _env: &Env, reply: &Reply) -> Result<Response, VmError> {
        let key = format!("reply:{}", reply.id);
        let outcome = serde_json::to_vec(&reply.result).map_err(|e| VmError::Contract(e.to_string()))?;
        deps.set(key.as_bytes(), &outcome)?;
        Ok(Response::new().set_data(key.into_bytes()))
    }

    fn query(&self, deps: &mut Deps<'_>, _env: &Env, msg: &[u8]) -> Result<Vec<u8>, VmError> {
        let request: QueryRequest =
            serde_json::from_slice(msg).map_err(|e| VmError::Contract(e.to_string()))?;
        deps.query(&request)
    }
}

pub(crate) fn counter_code() -> Counter {
    Counter
}

pub(crate) fn reflect_code() -> Reflect {
    Reflect
}

/// A keeper over an in-memory store, with both test contracts registered
/// and a funded creator.
pub(crate) struct Fixture {
    pub engine: MockEngine,
    pub keeper: Arc<Keeper>,
    pub bank: StoreBank,
    pub creator: Address,
    pub arena: StateArena,
    pub meter: GasMeter,
    pub events: EventManager,
    pub block: BlockInfo,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(WasmConfig::default())
    }

    pub fn with_config(config: WasmConfig) -> Self {
        let engine = MockEngine::new();
        engine.register(COUNTER_WASM, counter_code());
        engine.register(REFLECT_WASM, reflect_code());
        let keeper = Keeper::builder(VmAdapter::new(engine.clone()))
            .with_config(config)
            .build()
            .unwrap();
        let mut fixture = Self {
            engine,
            keeper: Arc::new(keeper),
            bank: StoreBank::new(),
            creator: Address::new(vec![1; 20]),
            arena: StateArena::new(Box::new(MemStore::new())),
            meter: GasMeter::new(50_000_000),
            events: EventManager::new(),
            block: BlockInfo::new(1, 1_000, "testing"),
        };
        let creator = fixture.creator.clone();
        fixture.fund(&creator, 1_000_000);
        fixture
    }

    pub fn ctx(&mut self) -> Context<'_> {
        Context::new(&mut self.arena, &mut self.meter, &mut self.events, &self.block)
    }

    pub fn store(&mut self, code: &[u8]) -> CodeId {
        let keeper = Arc::clone(&self.keeper);
        let creator = self.creator.clone();
        keeper
            .create(&mut self.ctx(), &creator, code, None, &DefaultAuthorizationPolicy)
            .unwrap()
            .0
    }

    pub fn instantiate(&mut self, code_id: CodeId, msg: &[u8]) -> Address {
        let keeper = Arc::clone(&self.keeper);
        let creator = self.creator.clone();
        keeper
            .instantiate(
                &mut self.ctx(),
                code_id,
                &creator,
                None,
                msg,
                "demo",
                &[],
                &DefaultAuthorizationPolicy,
            )
            .unwrap()
            .0
    }

    pub fn fund(&mut self, addr: &Address, amount: u128) {
        let bank = self.bank;
        bank.mint(&mut self.ctx(), addr, &[Coin::new(amount, DENOM)])
            .unwrap();
    }

    pub fn balance(&mut self, addr: &Address) -> u128 {
        let bank = self.bank;
        bank.balance(&self.ctx(), addr, DENOM).unwrap().amount
    }
}
