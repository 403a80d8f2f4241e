//! # Keeper
//!
//! Owns contract lifecycle and the records behind it. Every operation takes
//! the [`Context`] of the caller first and works inside its scope.
//!
//! | File | Contents |
//! |------|----------|
//! | `mod.rs` | `Keeper`, `KeeperBuilder`, records, sequences, runtime gas |
//! | `lifecycle.rs` | create, instantiate, execute, migrate, sudo, reply, pins, admin |
//! | `dispatcher.rs` | messages and submessages returned by contracts |
//! | `query.rs` | query routing, `QueryPlugins`, nested smart queries |
//! | `backend.rs` | the `Backend` the engine sees during a call |
//! | `permissioned.rs` | `PermissionedKeeper`, the authorized lifecycle API |

mod backend;
mod dispatcher;
mod lifecycle;
mod permissioned;
mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use permissioned::PermissionedKeeper;
pub use query::{
    BankQueryHandler, CustomQueryHandler, IbcQueryHandler, QueryPlugins, StakingQueryHandler,
    StargateQueryHandler, WasmQueryHandler,
};

use crate::adapters::bank::{StoreBank, StorePortKeeper};
use crate::adapters::messenger::DefaultMessenger;
use crate::adapters::staking::StaticStaking;
use crate::adapters::vm::VmAdapter;
use crate::config::WasmConfig;
use crate::context::Context;
use crate::domain::entities::{
    AbsoluteTxPosition, CodeInfo, ContractCodeHistoryEntry, ContractInfo, Params,
};
use crate::domain::gas::{GasRegister, WasmGasRegister};
use crate::domain::value_objects::{Address, CodeId};
use crate::errors::{StoreError, WasmError, WasmResult};
use crate::ports::inbound::ContractViews;
use crate::ports::outbound::{
    AccountKeeper, BankView, CoinTransferrer, Messenger, PortKeeper, StakingView,
};
use crate::store::keys::{
    code_key, contract_by_code_key, contract_key, contract_store_prefix, contracts_by_code_prefix,
    history_key, history_prefix, pinned_code_key, read_u64, sequence_key, CODE_KEY_PREFIX,
    CONTRACT_KEY_PREFIX, KEY_LAST_CODE_ID, KEY_LAST_INSTANCE_ID, PARAMS_KEY,
};
use crate::store::{KvPair, Order};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Descriptor of gas consumed by the engine.
pub const GAS_DESC_RUNTIME: &str = "wasm contract";

const PINNED_FLAG: &[u8] = &[1];

pub(crate) fn encode_record<T: Serialize>(value: &T) -> WasmResult<Vec<u8>> {
    Ok(bincode::serialize(value).map_err(StoreError::from)?)
}

pub(crate) fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> WasmResult<T> {
    Ok(bincode::deserialize(bytes).map_err(StoreError::from)?)
}

// =============================================================================
// KEEPER
// =============================================================================

/// The contract runtime.
pub struct Keeper {
    vm: VmAdapter,
    gas_register: Arc<dyn GasRegister>,
    accounts: Arc<dyn AccountKeeper>,
    bank: Arc<dyn CoinTransferrer>,
    ports: Arc<dyn PortKeeper>,
    messenger: Arc<dyn Messenger>,
    query_plugins: QueryPlugins,
    config: WasmConfig,
}

impl fmt::Debug for Keeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keeper")
            .field("vm", &self.vm)
            .field("gas_register", &self.gas_register)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Keeper {
    /// Starts building a keeper around `vm`.
    #[must_use]
    pub fn builder(vm: VmAdapter) -> KeeperBuilder {
        KeeperBuilder::new(vm)
    }

    /// Engine handle.
    #[must_use]
    pub fn vm(&self) -> &VmAdapter {
        &self.vm
    }

    /// Cost model.
    #[must_use]
    pub fn gas_register(&self) -> &dyn GasRegister {
        self.gas_register.as_ref()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &WasmConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // runtime gas
    // -------------------------------------------------------------------------

    /// VM gas the engine may burn in the current context.
    pub fn runtime_gas_for_contract(&self, ctx: &Context<'_>) -> WasmResult<u64> {
        let meter = ctx.gas();
        if meter.is_out_of_gas() {
            return Ok(0);
        }
        if meter.is_infinite() {
            return Ok(u64::MAX);
        }
        self.gas_register.to_vm_gas(meter.remaining())
    }

    /// Charges VM gas burned by the engine to the context meter.
    pub fn consume_runtime_gas(&self, ctx: &mut Context<'_>, vm_gas: u64) -> WasmResult<()> {
        let consumed = self.gas_register.from_vm_gas(vm_gas);
        ctx.consume_gas(consumed, GAS_DESC_RUNTIME)?;
        // the engine may stop exactly at its limit without the meter tripping
        if ctx.gas().is_out_of_gas() {
            return Err(WasmError::OutOfGas {
                descriptor: "Wasm engine function execution".into(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // sequences
    // -------------------------------------------------------------------------

    fn read_sequence(ctx: &Context<'_>, name: &[u8]) -> WasmResult<u64> {
        match ctx.get(&sequence_key(name))? {
            Some(bytes) => read_u64(&bytes)
                .ok_or_else(|| StoreError::Codec("corrupt sequence".into()).into()),
            None => Ok(1),
        }
    }

    fn auto_increment_id(ctx: &mut Context<'_>, name: &[u8]) -> WasmResult<u64> {
        let id = Self::read_sequence(ctx, name)?;
        let next = id
            .checked_add(1)
            .ok_or_else(|| WasmError::Invalid("sequence overflow".into()))?;
        ctx.set(&sequence_key(name), &next.to_be_bytes())?;
        Ok(id)
    }

    /// Next value of a sequence, without consuming it.
    pub fn peek_auto_increment_id(&self, ctx: &Context<'_>, name: &[u8]) -> WasmResult<u64> {
        Self::read_sequence(ctx, name)
    }

    /// Next code id.
    pub fn next_code_id(&self, ctx: &Context<'_>) -> WasmResult<CodeId> {
        Self::read_sequence(ctx, KEY_LAST_CODE_ID)
    }

    pub(crate) fn next_instance_id(ctx: &mut Context<'_>) -> WasmResult<u64> {
        Self::auto_increment_id(ctx, KEY_LAST_INSTANCE_ID)
    }

    pub(crate) fn allocate_code_id(ctx: &mut Context<'_>) -> WasmResult<CodeId> {
        Self::auto_increment_id(ctx, KEY_LAST_CODE_ID)
    }

    // -------------------------------------------------------------------------
    // params
    // -------------------------------------------------------------------------

    /// Module parameters, defaults if never set.
    pub fn get_params(&self, ctx: &Context<'_>) -> WasmResult<Params> {
        match ctx.get(PARAMS_KEY)? {
            Some(bytes) => decode_record(&bytes),
            None => Ok(Params::default()),
        }
    }

    /// Replaces the module parameters.
    pub fn set_params(&self, ctx: &mut Context<'_>, params: &Params) -> WasmResult<()> {
        ctx.set(PARAMS_KEY, &encode_record(params)?)
    }

    // -------------------------------------------------------------------------
    // code records
    // -------------------------------------------------------------------------

    /// Code record, if stored.
    pub fn get_code_info(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Option<CodeInfo>> {
        ctx.get(&code_key(code_id))?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    pub(crate) fn store_code_info(
        ctx: &mut Context<'_>,
        code_id: CodeId,
        info: &CodeInfo,
    ) -> WasmResult<()> {
        ctx.set(&code_key(code_id), &encode_record(info)?)
    }

    /// All code records ordered by id.
    pub fn iterate_code_infos(&self, ctx: &Context<'_>) -> WasmResult<Vec<(CodeId, CodeInfo)>> {
        ctx.prefix_range(&[CODE_KEY_PREFIX], Order::Ascending)?
            .into_iter()
            .map(|(key, value)| {
                let id = read_u64(&key[1..])
                    .ok_or_else(|| WasmError::from(StoreError::Codec("corrupt code key".into())))?;
                Ok((id, decode_record(&value)?))
            })
            .collect()
    }

    /// Stored code bytes.
    pub fn get_byte_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Vec<u8>> {
        let info = self
            .get_code_info(ctx, code_id)?
            .ok_or_else(|| WasmError::NotFound("code info".into()))?;
        self.vm
            .get_code(&info.code_hash)
            .map_err(|e| WasmError::NotFound(format!("code: {e}")))
    }

    /// Whether `code_id` carries the pinned flag.
    pub fn is_pinned_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<bool> {
        ctx.has(&pinned_code_key(code_id))
    }

    pub(crate) fn set_pinned_flag(ctx: &mut Context<'_>, code_id: CodeId, pinned: bool) -> WasmResult<()> {
        if pinned {
            ctx.set(&pinned_code_key(code_id), PINNED_FLAG)
        } else {
            ctx.delete(&pinned_code_key(code_id))
        }
    }

    // -------------------------------------------------------------------------
    // contract records
    // -------------------------------------------------------------------------

    /// Contract record, if any.
    pub fn get_contract_info(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<Option<ContractInfo>> {
        ctx.get(&contract_key(contract))?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    /// Returns true if a contract lives at `contract`.
    pub fn has_contract_info(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<bool> {
        ctx.has(&contract_key(contract))
    }

    pub(crate) fn store_contract_info(
        ctx: &mut Context<'_>,
        contract: &Address,
        info: &ContractInfo,
    ) -> WasmResult<()> {
        ctx.set(&contract_key(contract), &encode_record(info)?)
    }

    /// Contract record together with its code record.
    pub(crate) fn contract_with_code(
        &self,
        ctx: &Context<'_>,
        contract: &Address,
    ) -> WasmResult<(ContractInfo, CodeInfo)> {
        let info = self
            .get_contract_info(ctx, contract)?
            .ok_or_else(|| WasmError::NotFound("contract".into()))?;
        let code = self
            .get_code_info(ctx, info.code_id)?
            .ok_or_else(|| WasmError::NotFound("code info".into()))?;
        Ok((info, code))
    }

    /// All contracts ordered by address bytes.
    pub fn iterate_contract_infos(&self, ctx: &Context<'_>) -> WasmResult<Vec<(Address, ContractInfo)>> {
        ctx.prefix_range(&[CONTRACT_KEY_PREFIX], Order::Ascending)?
            .into_iter()
            .map(|(key, value)| {
                // key = prefix | len | addr
                let addr = Address::new(key.get(2..).unwrap_or_default());
                Ok((addr, decode_record(&value)?))
            })
            .collect()
    }

    /// Raw state of a contract, keys relative to its namespace.
    pub fn iterate_contract_state(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<Vec<KvPair>> {
        let prefix = contract_store_prefix(contract);
        Ok(ctx
            .prefix_range(&prefix, Order::Ascending)?
            .into_iter()
            .map(|(key, value)| (key[prefix.len()..].to_vec(), value))
            .collect())
    }

    /// Value at `key` of the contract namespace.
    pub fn query_raw(&self, ctx: &Context<'_>, contract: &Address, key: &[u8]) -> WasmResult<Option<Vec<u8>>> {
        if key.is_empty() {
            return Ok(None);
        }
        let mut full = contract_store_prefix(contract);
        full.extend_from_slice(key);
        ctx.get(&full)
    }

    // -------------------------------------------------------------------------
    // history and index
    // -------------------------------------------------------------------------

    /// Appends entries at the next free positions.
    pub(crate) fn append_to_contract_history(
        ctx: &mut Context<'_>,
        contract: &Address,
        entries: &[ContractCodeHistoryEntry],
    ) -> WasmResult<()> {
        let prefix = history_prefix(contract);
        let last = ctx
            .prefix_range(&prefix, Order::Descending)?
            .first()
            .and_then(|(key, _)| read_u64(&key[prefix.len()..]))
            .unwrap_or(0);
        for (offset, entry) in (1u64..).zip(entries) {
            ctx.set(&history_key(contract, last + offset), &encode_record(entry)?)?;
        }
        Ok(())
    }

    /// Code history, oldest first.
    pub fn get_contract_history(
        &self,
        ctx: &Context<'_>,
        contract: &Address,
    ) -> WasmResult<Vec<ContractCodeHistoryEntry>> {
        ctx.prefix_range(&history_prefix(contract), Order::Ascending)?
            .into_iter()
            .map(|(_, value)| decode_record(&value))
            .collect()
    }

    pub(crate) fn add_to_code_index(
        ctx: &mut Context<'_>,
        contract: &Address,
        entry: &ContractCodeHistoryEntry,
    ) -> WasmResult<()> {
        ctx.set(&contract_by_code_key(entry.code_id, &entry.updated, contract), &[])
    }

    pub(crate) fn remove_from_code_index(
        ctx: &mut Context<'_>,
        contract: &Address,
        entry: &ContractCodeHistoryEntry,
    ) -> WasmResult<()> {
        ctx.delete(&contract_by_code_key(entry.code_id, &entry.updated, contract))
    }

    /// Contracts running `code_id`, ordered by the position they got it.
    pub fn iterate_contracts_by_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Vec<Address>> {
        let prefix = contracts_by_code_prefix(code_id);
        let skip = prefix.len() + AbsoluteTxPosition::LEN;
        Ok(ctx
            .prefix_range(&prefix, Order::Ascending)?
            .into_iter()
            .map(|(key, _)| Address::new(key.get(skip..).unwrap_or_default()))
            .collect())
    }

    /// Newest history entry, used to find the live index entry.
    pub(crate) fn last_history_entry(
        &self,
        ctx: &Context<'_>,
        contract: &Address,
    ) -> WasmResult<Option<ContractCodeHistoryEntry>> {
        ctx.prefix_range(&history_prefix(contract), Order::Descending)?
            .first()
            .map(|(_, value)| decode_record(value))
            .transpose()
    }

    fn log_debug_error(&self, op: &str, err: &WasmError) {
        if self.config.contract_debug_mode {
            debug!(op, error = %err, "contract error before redaction");
        }
    }
}

impl ContractViews for Keeper {
    fn get_contract_info(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<Option<ContractInfo>> {
        Keeper::get_contract_info(self, ctx, contract)
    }

    fn get_code_info(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Option<CodeInfo>> {
        Keeper::get_code_info(self, ctx, code_id)
    }

    fn get_contract_history(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<Vec<ContractCodeHistoryEntry>> {
        Keeper::get_contract_history(self, ctx, contract)
    }

    fn contracts_by_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Vec<Address>> {
        self.iterate_contracts_by_code(ctx, code_id)
    }

    fn is_pinned_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<bool> {
        Keeper::is_pinned_code(self, ctx, code_id)
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Wraps the messenger after defaults are resolved.
pub type MessengerDecorator = Box<dyn FnOnce(Arc<dyn Messenger>) -> Arc<dyn Messenger> + Send>;

/// Assembles a [`Keeper`]; every collaborator not given gets its default.
pub struct KeeperBuilder {
    vm: VmAdapter,
    config: WasmConfig,
    gas_register: Option<Arc<dyn GasRegister>>,
    accounts: Option<Arc<dyn AccountKeeper>>,
    bank: Option<Arc<dyn CoinTransferrer>>,
    bank_view: Option<Arc<dyn BankView>>,
    ports: Option<Arc<dyn PortKeeper>>,
    staking: Option<Arc<dyn StakingView>>,
    messenger: Option<Arc<dyn Messenger>>,
    messenger_decorator: Option<MessengerDecorator>,
    query_plugins: QueryPlugins,
}

impl fmt::Debug for KeeperBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeeperBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KeeperBuilder {
    /// Builder with all defaults.
    #[must_use]
    pub fn new(vm: VmAdapter) -> Self {
        Self {
            vm,
            config: WasmConfig::default(),
            gas_register: None,
            accounts: None,
            bank: None,
            bank_view: None,
            ports: None,
            staking: None,
            messenger: None,
            messenger_decorator: None,
            query_plugins: QueryPlugins::default(),
        }
    }

    /// Runtime configuration.
    #[must_use]
    pub fn with_config(mut self, config: WasmConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the cost model built from the config.
    #[must_use]
    pub fn with_gas_register(mut self, register: Arc<dyn GasRegister>) -> Self {
        self.gas_register = Some(register);
        self
    }

    /// Account registry.
    #[must_use]
    pub fn with_accounts(mut self, accounts: Arc<dyn AccountKeeper>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Coin transfers, used for funds and by the default messenger.
    #[must_use]
    pub fn with_coin_transferrer(mut self, bank: Arc<dyn CoinTransferrer>) -> Self {
        self.bank = Some(bank);
        self
    }

    /// Balances for the default bank query plugin.
    #[must_use]
    pub fn with_bank_view(mut self, bank: Arc<dyn BankView>) -> Self {
        self.bank_view = Some(bank);
        self
    }

    /// IBC port registry.
    #[must_use]
    pub fn with_port_keeper(mut self, ports: Arc<dyn PortKeeper>) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Validator set for the default staking query plugin.
    #[must_use]
    pub fn with_staking(mut self, staking: Arc<dyn StakingView>) -> Self {
        self.staking = Some(staking);
        self
    }

    /// Replaces the default messenger.
    #[must_use]
    pub fn with_messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Wraps whichever messenger ends up configured.
    #[must_use]
    pub fn with_messenger_decorator(mut self, decorator: MessengerDecorator) -> Self {
        self.messenger_decorator = Some(decorator);
        self
    }

    /// Query handlers merged over the defaults.
    #[must_use]
    pub fn with_query_plugins(mut self, plugins: QueryPlugins) -> Self {
        self.query_plugins = self.query_plugins.merge(plugins);
        self
    }

    /// Resolves defaults and validates the configuration.
    pub fn build(self) -> WasmResult<Keeper> {
        self.config
            .validate()
            .map_err(|e| WasmError::Invalid(e.to_string()))?;
        let gas_register: Arc<dyn GasRegister> = match self.gas_register {
            Some(register) => register,
            None => Arc::new(WasmGasRegister::new(self.config.gas_register.clone())?),
        };
        let store_bank = Arc::new(StoreBank::new());
        let accounts = self.accounts.unwrap_or_else(|| store_bank.clone());
        let bank = self.bank.unwrap_or_else(|| store_bank.clone());
        let bank_view = self.bank_view.unwrap_or_else(|| store_bank.clone());
        let ports = self
            .ports
            .unwrap_or_else(|| Arc::new(StorePortKeeper::new()));
        let staking = self
            .staking
            .unwrap_or_else(|| Arc::new(StaticStaking::default()));
        let mut messenger = self
            .messenger
            .unwrap_or_else(|| Arc::new(DefaultMessenger::new(bank.clone())));
        if let Some(decorate) = self.messenger_decorator {
            messenger = decorate(messenger);
        }
        let query_plugins = QueryPlugins::defaults(bank_view, staking).merge(self.query_plugins);

        Ok(Keeper {
            vm: self.vm,
            gas_register,
            accounts,
            bank,
            ports,
            messenger,
            query_plugins,
            config: self.config,
        })
    }
}
