//! # Contract Runtime Service
//!
//! Async facade that owns the committed state and runs whole transactions
//! and top-level queries against it.
//!
//! ## Concurrency
//!
//! - State lives behind a `tokio::sync::RwLock`
//! - Transactions take the write lock and commit only on success
//! - Smart queries take the read lock, so parallel queries contend only on
//!   the engine lock
//! - The keeper is synchronous; every call runs on the blocking pool

use crate::context::{Context, EventManager};
use crate::domain::entities::{AccessConfig, BlockInfo};
use crate::domain::gas::Gas;
use crate::domain::gas_meter::GasMeter;
use crate::domain::value_objects::{Address, Binary, Checksum, Coin, CodeId};
use crate::errors::{SystemError, WasmError, WasmResult};
use crate::keeper::{Keeper, PermissionedKeeper};
use crate::ports::inbound::{ContractOps, TxOutcome, WasmApi};
use crate::store::{MemStore, ReadOnlyStore, StateArena};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Gas limit of a transaction.
    pub tx_gas_limit: Gas,
    /// Chain id reported to contracts.
    pub chain_id: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tx_gas_limit: 10_000_000,
            chain_id: "quantum-chain".to_string(),
        }
    }
}

/// Statistics for the service.
#[derive(Debug, Default, Clone)]
pub struct ServiceStats {
    /// Transactions run, committed or not.
    pub transactions_executed: u64,
    /// Transactions that committed.
    pub successful_transactions: u64,
    /// Transactions rolled back.
    pub failed_transactions: u64,
    /// Gas consumed by all transactions.
    pub total_gas_used: u64,
    /// Smart and raw queries answered.
    pub queries_served: u64,
    /// Queries that returned an error.
    pub failed_queries: u64,
    /// Average transaction time in microseconds.
    pub avg_execution_time_us: u64,
}

/// The contract runtime service.
pub struct WasmService {
    ops: PermissionedKeeper,
    state: Arc<RwLock<MemStore>>,
    block: Arc<RwLock<BlockInfo>>,
    config: ServiceConfig,
    stats: Arc<RwLock<ServiceStats>>,
}

impl std::fmt::Debug for WasmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn join_error(err: &tokio::task::JoinError) -> WasmError {
    error!(error = %err, "blocking task failed");
    WasmError::System(SystemError::Unknown)
}

impl WasmService {
    /// Service over empty state, with transaction messages checked by the
    /// default authorization policy.
    pub fn new(keeper: Arc<Keeper>, config: ServiceConfig) -> Self {
        Self::with_state(PermissionedKeeper::with_default_policy(keeper), MemStore::new(), config)
    }

    /// Service over existing state.
    pub fn with_state(ops: PermissionedKeeper, state: MemStore, config: ServiceConfig) -> Self {
        let block = BlockInfo::new(1, 0, config.chain_id.clone());
        Self {
            ops,
            state: Arc::new(RwLock::new(state)),
            block: Arc::new(RwLock::new(block)),
            config,
            stats: Arc::new(RwLock::new(ServiceStats::default())),
        }
    }

    /// The keeper behind the service.
    pub fn keeper(&self) -> &Keeper {
        self.ops.keeper()
    }

    /// Current service statistics.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    /// Current block.
    pub async fn block(&self) -> BlockInfo {
        self.block.read().await.clone()
    }

    /// Moves to a new block; transaction positions restart at zero.
    pub async fn begin_block(&self, height: u64, time_nanos: u64) {
        let mut block = self.block.write().await;
        *block = BlockInfo::new(height, time_nanos, self.config.chain_id.clone());
        debug!(height, "block started");
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemStore {
        self.state.read().await.clone()
    }

    /// Runs `op` as one transaction: all writes commit if it returns `Ok`,
    /// none otherwise.
    #[instrument(skip_all, fields(correlation_id = %Uuid::new_v4(), gas_limit = gas_limit))]
    pub async fn transact<T, F>(&self, gas_limit: Gas, op: F) -> WasmResult<TxOutcome<T>>
    where
        T: Send + 'static,
        F: FnOnce(&PermissionedKeeper, &mut Context<'_>) -> WasmResult<T> + Send + 'static,
    {
        let start = Instant::now();
        let guard = self.state.clone().write_owned().await;
        let block = {
            let mut current = self.block.write().await;
            let block = current.clone();
            current.tx_index += 1;
            block
        };
        let ops = self.ops.clone();

        let result = tokio::task::spawn_blocking(move || -> WasmResult<TxOutcome<T>> {
            let mut arena = StateArena::new(Box::new(guard));
            let mut meter = GasMeter::new(gas_limit);
            let mut events = EventManager::new();
            let value = {
                let mut ctx = Context::new(&mut arena, &mut meter, &mut events, &block);
                op(&ops, &mut ctx)?
            };
            arena.flush()?;
            Ok(TxOutcome {
                value,
                gas_used: meter.consumed(),
                events: events.into_events(),
            })
        })
        .await
        .map_err(|e| join_error(&e))?;

        let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        let mut stats = self.stats.write().await;
        stats.transactions_executed += 1;
        match &result {
            Ok(outcome) => {
                stats.successful_transactions += 1;
                stats.total_gas_used = stats.total_gas_used.saturating_add(outcome.gas_used);
                debug!(gas_used = outcome.gas_used, events = outcome.events.len(), "transaction committed");
            }
            Err(e) => {
                stats.failed_transactions += 1;
                warn!(error = %e, "transaction rolled back");
            }
        }
        let total = stats.transactions_executed;
        stats.avg_execution_time_us = (stats.avg_execution_time_us * (total - 1) + elapsed_us) / total;
        result
    }

    /// Runs `op` against a read-only view of the committed state under
    /// the smart query gas limit. Out of gas becomes `QueryFailed`.
    pub async fn query_with<T, F>(&self, op: F) -> WasmResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Keeper, &mut Context<'_>) -> WasmResult<T> + Send + 'static,
    {
        let guard = self.state.clone().read_owned().await;
        let block = self.block.read().await.clone();
        let ops = self.ops.clone();
        let gas_limit = ops.keeper().config().smart_query_gas_limit;

        let result = tokio::task::spawn_blocking(move || {
            let mut arena = StateArena::new(Box::new(ReadOnlyStore(guard)));
            let mut meter = GasMeter::new(gas_limit);
            let mut events = EventManager::new();
            let mut ctx = Context::new(&mut arena, &mut meter, &mut events, &block);
            op(ops.keeper(), &mut ctx)
        })
        .await
        .map_err(|e| join_error(&e))?
        .map_err(|e| {
            if e.is_fatal() {
                WasmError::QueryFailed(e.to_string())
            } else {
                e
            }
        });

        let mut stats = self.stats.write().await;
        stats.queries_served += 1;
        if let Err(e) = &result {
            stats.failed_queries += 1;
            debug!(error = %e, "query failed");
        }
        result
    }
}

#[async_trait]
impl WasmApi for WasmService {
    async fn store_code(
        &self,
        sender: Address,
        wasm: Vec<u8>,
        instantiate_permission: Option<AccessConfig>,
    ) -> WasmResult<TxOutcome<(CodeId, Checksum)>> {
        let outcome = self
            .transact(self.config.tx_gas_limit, move |ops, ctx| {
                ops.create(ctx, &sender, &wasm, instantiate_permission.as_ref())
            })
            .await?;
        info!(code_id = outcome.value.0, "code stored");
        Ok(outcome)
    }

    async fn instantiate(
        &self,
        sender: Address,
        code_id: CodeId,
        admin: Option<Address>,
        msg: Vec<u8>,
        label: String,
        funds: Vec<Coin>,
    ) -> WasmResult<TxOutcome<(Address, Option<Binary>)>> {
        self.transact(self.config.tx_gas_limit, move |ops, ctx| {
            ContractOps::instantiate(ops, ctx, code_id, &sender, admin.as_ref(), &msg, &label, &funds)
        })
        .await
    }

    async fn execute(
        &self,
        sender: Address,
        contract: Address,
        msg: Vec<u8>,
        funds: Vec<Coin>,
    ) -> WasmResult<TxOutcome<Option<Binary>>> {
        self.transact(self.config.tx_gas_limit, move |ops, ctx| {
            ContractOps::execute(ops, ctx, &contract, &sender, &msg, &funds)
        })
        .await
    }

    async fn migrate(
        &self,
        sender: Address,
        contract: Address,
        new_code_id: CodeId,
        msg: Vec<u8>,
    ) -> WasmResult<TxOutcome<Option<Binary>>> {
        self.transact(self.config.tx_gas_limit, move |ops, ctx| {
            ContractOps::migrate(ops, ctx, &contract, &sender, new_code_id, &msg)
        })
        .await
    }

    async fn smart_query(&self, contract: Address, msg: Vec<u8>) -> WasmResult<Vec<u8>> {
        self.query_with(move |keeper, ctx| keeper.query_smart(ctx, &contract, &msg))
            .await
    }

    async fn raw_query(&self, contract: Address, key: Vec<u8>) -> WasmResult<Option<Vec<u8>>> {
        self.query_with(move |keeper, ctx| keeper.query_raw(ctx, &contract, &key))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bank::StoreBank;
    use crate::adapters::mock_engine::MockEngine;
    use crate::adapters::vm::VmAdapter;
    use crate::keeper::testing::{counter_code, COUNTER_WASM, DENOM};
    use crate::ports::outbound::BankView;

    fn service() -> WasmService {
        let engine = MockEngine::new();
        engine.register(COUNTER_WASM, counter_code());
        let keeper = Keeper::builder(VmAdapter::new(engine)).build().unwrap();
        WasmService::new(Arc::new(keeper), ServiceConfig::default())
    }

    fn sender() -> Address {
        Address::new(vec![7; 20])
    }

    async fn deploy(service: &WasmService) -> Address {
        let code_id = service
            .store_code(sender(), COUNTER_WASM.to_vec(), None)
            .await
            .unwrap()
            .value
            .0;
        service
            .instantiate(sender(), code_id, None, br#"{"count":1}"#.to_vec(), "counter".into(), vec![])
            .await
            .unwrap()
            .value
            .0
    }

    #[tokio::test]
    async fn test_transaction_commits() {
        let service = service();
        let contract = deploy(&service).await;

        let outcome = service
            .execute(sender(), contract.clone(), b"increment".to_vec(), vec![])
            .await
            .unwrap();
        assert!(outcome.gas_used > 0);
        assert!(outcome.events.iter().any(|e| e.ty == "wasm"));

        let raw = service.raw_query(contract, b"count".to_vec()).await.unwrap();
        assert_eq!(raw, Some(b"2".to_vec()));

        let stats = service.stats().await;
        assert_eq!(stats.successful_transactions, 3);
        assert_eq!(stats.failed_transactions, 0);
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let service = service();
        let contract = deploy(&service).await;
        let before = service.snapshot().await;

        let err = service
            .execute(sender(), contract, b"unknown".to_vec(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err.root(), WasmError::ExecuteFailed(_)));
        assert_eq!(service.snapshot().await, before);
        assert_eq!(service.stats().await.failed_transactions, 1);
    }

    #[tokio::test]
    async fn test_out_of_gas_is_not_committed() {
        let service = service();
        let contract = deploy(&service).await;
        let before = service.snapshot().await;

        let err = service
            .execute(sender(), contract, b"burn".to_vec(), vec![])
            .await
            .unwrap_err();
        assert!(err.is_out_of_gas());
        assert_eq!(service.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_smart_query_reads_committed_state() {
        let service = service();
        let contract = deploy(&service).await;

        let answer = service.smart_query(contract, b"{}".to_vec()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&answer).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(service.stats().await.queries_served, 1);
    }

    #[tokio::test]
    async fn test_query_of_unknown_contract_fails() {
        let service = service();
        let before = service.snapshot().await;
        assert!(service
            .smart_query(Address::new(vec![9; 32]), b"{}".to_vec())
            .await
            .is_err());
        assert_eq!(service.snapshot().await, before);
        assert_eq!(service.stats().await.failed_queries, 1);
    }

    #[tokio::test]
    async fn test_transact_with_custom_operation() {
        let service = service();
        let bank = StoreBank::new();
        let holder = sender();
        service
            .transact(1_000_000, move |_, ctx| bank.mint(ctx, &holder, &[Coin::new(500, DENOM)]))
            .await
            .unwrap();

        let holder = sender();
        let balance = service
            .query_with(move |_, ctx| bank.balance(ctx, &holder, DENOM))
            .await
            .unwrap();
        assert_eq!(balance.amount, 500);
    }

    #[tokio::test]
    async fn test_begin_block_resets_position() {
        let service = service();
        deploy(&service).await;
        assert_eq!(service.block().await.tx_index, 2);

        service.begin_block(2, 5_000).await;
        let block = service.block().await;
        assert_eq!(block.height, 2);
        assert_eq!(block.tx_index, 0);
        assert_eq!(block.chain_id, "quantum-chain");
    }
}
