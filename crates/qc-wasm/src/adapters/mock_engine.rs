//! # Mock Engine
//!
//! A deterministic in-process [`WasmEngine`] for hosts' tests.
//!
//! Contracts are plain Rust types implementing [`ContractLogic`], registered
//! against the code bytes that will later be uploaded. Gas is charged from a
//! fixed cost table so tests can predict it exactly.

use crate::domain::entities::{AnalysisReport, Env, MessageInfo};
use crate::domain::messages::{QueryRequest, Reply, Response};
use crate::domain::services::{checksum, is_wasm};
use crate::domain::value_objects::Checksum;
use crate::errors::{QuerierError, VmError};
use crate::ports::outbound::{Backend, VmOutput, WasmEngine};
use crate::store::{KvPair, Order};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// =============================================================================
// COSTS
// =============================================================================

/// VM gas charged by the mock engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockGasCosts {
    /// Per entry point call.
    pub call: u64,
    /// Per storage read, write or delete.
    pub storage_op: u64,
    /// Per query issued by the contract.
    pub query: u64,
}

impl MockGasCosts {
    /// Charges nothing.
    #[must_use]
    pub fn free() -> Self {
        Self {
            call: 0,
            storage_op: 0,
            query: 0,
        }
    }
}

impl Default for MockGasCosts {
    fn default() -> Self {
        Self {
            call: 1_400_000_000,
            storage_op: 140_000_000,
            query: 0,
        }
    }
}

// =============================================================================
// CONTRACT API
// =============================================================================

/// What a contract sees while it runs: metered storage and a querier.
pub struct Deps<'a> {
    backend: &'a mut dyn Backend,
    gas_used: u64,
    gas_limit: u64,
    costs: MockGasCosts,
}

impl<'a> Deps<'a> {
    fn new(backend: &'a mut dyn Backend, gas_limit: u64, costs: MockGasCosts) -> Self {
        Self {
            backend,
            gas_used: 0,
            gas_limit,
            costs,
        }
    }

    /// VM gas used so far.
    #[must_use]
    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    /// VM gas left.
    #[must_use]
    pub fn gas_left(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    /// Burns `vm_gas`, failing with [`VmError::GasDepletion`] past the limit.
    pub fn charge(&mut self, vm_gas: u64) -> Result<(), VmError> {
        let next = self.gas_used.saturating_add(vm_gas);
        if next > self.gas_limit {
            self.gas_used = self.gas_limit;
            return Err(VmError::GasDepletion);
        }
        self.gas_used = next;
        Ok(())
    }

    /// Reads `key`.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, VmError> {
        self.charge(self.costs.storage_op)?;
        self.backend.get(key)
    }

    /// Writes `key`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError> {
        self.charge(self.costs.storage_op)?;
        self.backend.set(key, value)
    }

    /// Removes `key`.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), VmError> {
        self.charge(self.costs.storage_op)?;
        self.backend.remove(key)
    }

    /// Range read.
    pub fn range(
        &mut self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Result<Vec<KvPair>, VmError> {
        self.charge(self.costs.storage_op)?;
        self.backend.range(start, end, order)
    }

    /// Runs a query with the gas that is left.
    ///
    /// Host aborts surface as [`VmError::Backend`]; query failures as
    /// [`VmError::Contract`] carrying the (possibly redacted) text.
    pub fn query(&mut self, request: &QueryRequest) -> Result<Vec<u8>, VmError> {
        self.charge(self.costs.query)?;
        let limit = self.gas_left();
        self.backend.query(request, limit).map_err(|e| match e {
            QuerierError::Aborted => VmError::Backend(e.to_string()),
            QuerierError::System(sys) => VmError::Contract(format!("Querier system error: {sys}")),
            QuerierError::Redacted(text) => VmError::Contract(format!("Querier contract error: {text}")),
        })
    }

    /// Runs a query and decodes the JSON answer.
    pub fn query_json<T: DeserializeOwned>(&mut self, request: &QueryRequest) -> Result<T, VmError> {
        let bytes = self.query(request)?;
        serde_json::from_slice(&bytes).map_err(|e| VmError::Contract(format!("parse query response: {e}")))
    }

    /// Ledger gas consumed by the caller, in VM units.
    #[must_use]
    pub fn host_gas_consumed(&self) -> u64 {
        self.backend.gas_consumed()
    }
}

fn missing<T>(entry_point: &str) -> Result<T, VmError> {
    Err(VmError::MissingEntryPoint(entry_point.to_string()))
}

/// Contract behavior run by the mock engine.
///
/// Entry points that are not overridden are reported as missing exports.
pub trait ContractLogic: Send + Sync {
    /// `instantiate` entry point.
    fn instantiate(&self, deps: &mut Deps<'_>, env: &Env, info: &MessageInfo, msg: &[u8]) -> Result<Response, VmError>;

    /// `execute` entry point.
    fn execute(&self, _deps: &mut Deps<'_>, _env: &Env, _info: &MessageInfo, _msg: &[u8]) -> Result<Response, VmError> {
        missing("execute")
    }

    /// `migrate` entry point.
    fn migrate(&self, _deps: &mut Deps<'_>, _env: &Env, _msg: &[u8]) -> Result<Response, VmError> {
        missing("migrate")
    }

    /// `sudo` entry point.
    fn sudo(&self, _deps: &mut Deps<'_>, _env: &Env, _msg: &[u8]) -> Result<Response, VmError> {
        missing("sudo")
    }

    /// `reply` entry point.
    fn reply(&self, _deps: &mut Deps<'_>, _env: &Env, _reply: &Reply) -> Result<Response, VmError> {
        missing("reply")
    }

    /// `query` entry point.
    fn query(&self, _deps: &mut Deps<'_>, _env: &Env, _msg: &[u8]) -> Result<Vec<u8>, VmError> {
        missing("query")
    }

    /// Whether the contract exports the IBC channel entry points.
    fn has_ibc_entry_points(&self) -> bool {
        false
    }

    /// Capabilities the contract requires.
    fn required_features(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Default)]
struct EngineState {
    registered: HashMap<Checksum, Arc<dyn ContractLogic>>,
    stored: HashMap<Checksum, Vec<u8>>,
    pinned: BTreeSet<Checksum>,
}

/// In-process engine. Clones share the same registry.
#[derive(Clone)]
pub struct MockEngine {
    state: Arc<RwLock<EngineState>>,
    costs: MockGasCosts,
    reject_pins: Arc<AtomicBool>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MockEngine")
            .field("registered", &state.registered.len())
            .field("stored", &state.stored.len())
            .field("costs", &self.costs)
            .finish()
    }
}

impl MockEngine {
    /// Engine with the default cost table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_costs(MockGasCosts::default())
    }

    /// Engine with a custom cost table.
    #[must_use]
    pub fn with_costs(costs: MockGasCosts) -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::default())),
            costs,
            reject_pins: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers `logic` for `code`. Returns the checksum uploads will get.
    pub fn register(&self, code: &[u8], logic: impl ContractLogic + 'static) -> Checksum {
        let sum = checksum(code);
        self.state.write().registered.insert(sum, Arc::new(logic));
        sum
    }

    /// Makes pin and unpin fail, to exercise error paths.
    pub fn set_reject_pins(&self, reject: bool) {
        self.reject_pins.store(reject, Ordering::SeqCst);
    }

    /// Returns true if `checksum` is pinned.
    #[must_use]
    pub fn is_pinned(&self, checksum: &Checksum) -> bool {
        self.state.read().pinned.contains(checksum)
    }

    fn logic(&self, checksum: &Checksum) -> Result<Arc<dyn ContractLogic>, VmError> {
        let state = self.state.read();
        if !state.stored.contains_key(checksum) {
            return Err(VmError::CodeNotFound(checksum.to_string()));
        }
        state
            .registered
            .get(checksum)
            .cloned()
            .ok_or_else(|| VmError::CodeNotFound(checksum.to_string()))
    }

    fn run<T>(
        &self,
        checksum: &Checksum,
        backend: &mut dyn Backend,
        gas_limit: u64,
        call: impl FnOnce(&dyn ContractLogic, &mut Deps<'_>) -> Result<T, VmError>,
    ) -> VmOutput<T> {
        // registry lock is released before the contract runs; it may re-enter
        let logic = match self.logic(checksum) {
            Ok(logic) => logic,
            Err(e) => return VmOutput::err(e, 0),
        };
        let mut deps = Deps::new(backend, gas_limit, self.costs);
        let result = deps
            .charge(self.costs.call)
            .and_then(|()| call(logic.as_ref(), &mut deps));
        VmOutput {
            result,
            gas_used: deps.gas_used,
        }
    }
}

impl WasmEngine for MockEngine {
    fn create(&self, code: &[u8]) -> Result<Checksum, VmError> {
        if !is_wasm(code) {
            return Err(VmError::Compile("Wasm magic header not found".into()));
        }
        let sum = checksum(code);
        let mut state = self.state.write();
        if !state.registered.contains_key(&sum) {
            return Err(VmError::Compile(format!("no contract logic for {sum}")));
        }
        state.stored.insert(sum, code.to_vec());
        Ok(sum)
    }

    fn analyze_code(&self, checksum: &Checksum) -> Result<AnalysisReport, VmError> {
        let logic = self.logic(checksum)?;
        Ok(AnalysisReport {
            has_ibc_entry_points: logic.has_ibc_entry_points(),
            required_features: logic.required_features(),
        })
    }

    fn get_code(&self, checksum: &Checksum) -> Result<Vec<u8>, VmError> {
        self.state
            .read()
            .stored
            .get(checksum)
            .cloned()
            .ok_or_else(|| VmError::CodeNotFound(checksum.to_string()))
    }

    fn pin(&self, checksum: &Checksum) -> Result<(), VmError> {
        if self.reject_pins.load(Ordering::SeqCst) {
            return Err(VmError::Backend("pinning rejected".into()));
        }
        let mut state = self.state.write();
        if !state.stored.contains_key(checksum) {
            return Err(VmError::CodeNotFound(checksum.to_string()));
        }
        state.pinned.insert(*checksum);
        Ok(())
    }

    fn unpin(&self, checksum: &Checksum) -> Result<(), VmError> {
        if self.reject_pins.load(Ordering::SeqCst) {
            return Err(VmError::Backend("unpinning rejected".into()));
        }
        self.state.write().pinned.remove(checksum);
        Ok(())
    }

    fn instantiate(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.run(checksum, backend, gas_limit, |logic, deps| {
            logic.instantiate(deps, env, info, msg)
        })
    }

    fn execute(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.run(checksum, backend, gas_limit, |logic, deps| {
            logic.execute(deps, env, info, msg)
        })
    }

    fn migrate(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.run(checksum, backend, gas_limit, |logic, deps| logic.migrate(deps, env, msg))
    }

    fn sudo(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.run(checksum, backend, gas_limit, |logic, deps| logic.sudo(deps, env, msg))
    }

    fn reply(
        &self,
        checksum: &Checksum,
        env: &Env,
        reply: &Reply,
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.run(checksum, backend, gas_limit, |logic, deps| logic.reply(deps, env, reply))
    }

    fn query(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Vec<u8>> {
        self.run(checksum, backend, gas_limit, |logic, deps| logic.query(deps, env, msg))
    }
}
