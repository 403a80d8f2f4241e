//! # Contract Lifecycle
//!
//! Upload, instantiation, calls, migration and the admin operations.
//!
//! Every call into the engine goes through [`Keeper::call_vm`]: the engine gets
//! the VM gas left in the context, the gas it burned is charged back, and a
//! fatal error raised by a nested query wins over whatever the engine returned.
//! Contract responses are then turned into events and dispatched by
//! [`Keeper::handle_contract_response`].

use super::backend::ContractBackend;
use super::Keeper;
use crate::adapters::authz::DefaultAuthorizationPolicy;
use crate::adapters::vm::VmAdapter;
use crate::context::Context;
use crate::domain::entities::{
    AccessConfig, CodeInfo, ContractCodeHistoryEntry, ContractInfo, Env, MessageInfo,
};
use crate::domain::invariants::check_permission_subset;
use crate::domain::messages::{Reply, Response};
use crate::domain::services::{build_contract_address, port_id_for_contract, uncompress};
use crate::domain::value_objects::{Address, Binary, Checksum, Coin, CodeId};
use crate::errors::{WasmError, WasmResult};
use crate::events::{
    contract_call_event, filter_message_events, instantiate_event, migrate_event,
    new_custom_events, new_wasm_module_event, pin_event, store_code_event, update_admin_event,
    EVENT_TYPE_EXECUTE, EVENT_TYPE_PIN_CODE, EVENT_TYPE_REPLY, EVENT_TYPE_SUDO,
    EVENT_TYPE_UNPIN_CODE,
};
use crate::metrics;
use crate::ports::inbound::{ContractHost, Replyer};
use crate::ports::outbound::{AuthorizationPolicy, Backend, VmOutput};
use crate::store::keys::{contract_store_prefix, sequence_key, PINNED_CODE_PREFIX, KEY_LAST_CODE_ID};
use crate::store::{KvPair, Order};
use std::time::Instant;
use tracing::{info, instrument};

/// Descriptor of the gas charged for compiling uploaded code.
pub const GAS_DESC_COMPILE: &str = "Compiling wasm bytecode";

/// Descriptor of the gas charged for contract attributes and events.
pub const GAS_DESC_EVENTS: &str = "Custom contract event attributes";

const GAS_DESC_SETUP_INSTANTIATE: &str = "Loading CosmWasm module: instantiate";
const GAS_DESC_SETUP_EXECUTE: &str = "Loading CosmWasm module: execute";
const GAS_DESC_SETUP_MIGRATE: &str = "Loading CosmWasm module: migrate";
const GAS_DESC_SETUP_SUDO: &str = "Loading CosmWasm module: sudo";
const GAS_DESC_SETUP_REPLY: &str = "Loading CosmWasm module: reply";

/// True when `funds` moves nothing.
fn is_zero(funds: &[Coin]) -> bool {
    funds.iter().all(|coin| coin.amount == 0)
}

impl Keeper {
    // -------------------------------------------------------------------------
    // engine calls
    // -------------------------------------------------------------------------

    /// Runs one engine entry point against `contract`'s namespace.
    ///
    /// Engine failures become `on_err(message)`.
    pub(crate) fn call_vm<T>(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        op: &'static str,
        call: impl FnOnce(&VmAdapter, &mut dyn Backend, u64) -> VmOutput<T>,
        on_err: fn(String) -> WasmError,
    ) -> WasmResult<T> {
        let started = Instant::now();
        let gas_limit = self.runtime_gas_for_contract(ctx)?;
        let (output, fatal) = {
            let mut backend = ContractBackend::new(self, ctx, contract);
            let output = call(&self.vm, &mut backend, gas_limit);
            (output, backend.into_fatal())
        };
        if let Some(err) = fatal {
            metrics::record_contract_call(op, false, started.elapsed());
            return Err(err);
        }
        let charged = self.consume_runtime_gas(ctx, output.gas_used);
        let result = charged.and(output.result.map_err(|e| on_err(e.to_string())));
        if let Err(err) = &result {
            self.log_debug_error(op, err);
        }
        metrics::record_contract_call(op, result.is_ok(), started.elapsed());
        result
    }

    /// Emits the events of a contract response and dispatches its messages.
    ///
    /// Data set by a reply replaces the data of the response.
    pub fn handle_contract_response(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        ibc_port: Option<&str>,
        response: Response,
    ) -> WasmResult<Option<Binary>> {
        let gas = self
            .gas_register
            .event_costs(&response.attributes, &response.events)?;
        ctx.consume_gas(gas, GAS_DESC_EVENTS)?;
        if let Some(event) = new_wasm_module_event(&response.attributes, contract)? {
            ctx.emit(event);
        }
        for event in new_custom_events(&response.events, contract)? {
            ctx.emit(event);
        }
        let data = self.dispatch_submessages(ctx, contract, ibc_port, &response.messages)?;
        Ok(data.or(response.data))
    }

    fn charge_setup(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        msg_len: usize,
        descriptor: &str,
    ) -> WasmResult<()> {
        let pinned = self.is_pinned_code(ctx, code_id)?;
        let gas = self.gas_register.instantiate_cost(pinned, msg_len)?;
        ctx.consume_gas(gas, descriptor)
    }

    fn transfer_funds(
        &self,
        ctx: &mut Context<'_>,
        from: &Address,
        to: &Address,
        funds: &[Coin],
    ) -> WasmResult<()> {
        if is_zero(funds) {
            return Ok(());
        }
        let events = self.bank.transfer_coins(ctx, from, to, funds)?;
        ctx.events().emit_all(filter_message_events(events));
        Ok(())
    }

    fn bind_contract_port(&self, ctx: &mut Context<'_>, contract: &Address) -> WasmResult<String> {
        let port_id = port_id_for_contract(contract);
        self.ports.bind_port(ctx, &port_id, contract)?;
        Ok(port_id)
    }

    // -------------------------------------------------------------------------
    // code
    // -------------------------------------------------------------------------

    /// Uploads code, optionally gzipped. Returns the new code id and checksum.
    #[instrument(skip_all, fields(creator = %creator, size = wasm.len()))]
    pub fn create(
        &self,
        ctx: &mut Context<'_>,
        creator: &Address,
        wasm: &[u8],
        instantiate_access: Option<&AccessConfig>,
        policy: &dyn AuthorizationPolicy,
    ) -> WasmResult<(CodeId, Checksum)> {
        if creator.is_empty() {
            return Err(WasmError::InvalidAddress("cannot be nil".into()));
        }
        let code = uncompress(wasm, self.config.max_wasm_size)?;
        ctx.consume_gas(self.gas_register.compile_cost(code.len())?, GAS_DESC_COMPILE)?;

        let params = self.get_params(ctx)?;
        if !policy.can_create_code(&params.code_upload_access, creator) {
            return Err(WasmError::Unauthorized("can not create code".into()));
        }
        let default_access = params.instantiate_default_permission.with(creator);
        let instantiate_config = match instantiate_access {
            Some(requested) => {
                check_permission_subset(requested, &default_access)?;
                requested.clone()
            }
            None => default_access,
        };

        let code_hash = self
            .vm
            .create(&code)
            .map_err(|e| WasmError::CreateFailed(e.to_string()))?;
        let report = self
            .vm
            .analyze_code(&code_hash)
            .map_err(|e| WasmError::CreateFailed(e.to_string()))?;
        let code_id = Self::allocate_code_id(ctx)?;
        let info = CodeInfo {
            code_hash,
            creator: creator.clone(),
            instantiate_config,
        };
        Self::store_code_info(ctx, code_id, &info)?;
        ctx.emit(store_code_event(code_id, &report.required_features));
        info!(code_id, checksum = %code_hash, "stored contract code");
        Ok((code_id, code_hash))
    }

    /// Changes who may instantiate `code_id`.
    pub fn set_access_config(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        caller: &Address,
        config: AccessConfig,
        policy: &dyn AuthorizationPolicy,
    ) -> WasmResult<()> {
        let mut info = self
            .get_code_info(ctx, code_id)?
            .ok_or_else(|| WasmError::NotFound("code info".into()))?;
        let params = self.get_params(ctx)?;
        let is_subset =
            config.is_subset(&params.instantiate_default_permission.with(&info.creator));
        if !policy.can_modify_code_access_config(&info.creator, caller, is_subset) {
            return Err(WasmError::Unauthorized("can not modify code access config".into()));
        }
        info.instantiate_config = config;
        Self::store_code_info(ctx, code_id, &info)
    }

    /// Pins code in the engine cache; later calls skip the instance cost.
    #[instrument(skip(self, ctx))]
    pub fn pin_code(&self, ctx: &mut Context<'_>, code_id: CodeId) -> WasmResult<()> {
        let info = self
            .get_code_info(ctx, code_id)?
            .ok_or_else(|| WasmError::NotFound("code info".into()))?;
        self.vm
            .pin(&info.code_hash)
            .map_err(|e| WasmError::PinContractFailed(e.to_string()))?;
        Self::set_pinned_flag(ctx, code_id, true)?;
        ctx.emit(pin_event(EVENT_TYPE_PIN_CODE, code_id));
        info!(code_id, "pinned code");
        Ok(())
    }

    /// Releases pinned code.
    #[instrument(skip(self, ctx))]
    pub fn unpin_code(&self, ctx: &mut Context<'_>, code_id: CodeId) -> WasmResult<()> {
        let info = self
            .get_code_info(ctx, code_id)?
            .ok_or_else(|| WasmError::NotFound("code info".into()))?;
        self.vm
            .unpin(&info.code_hash)
            .map_err(|e| WasmError::UnpinContractFailed(e.to_string()))?;
        Self::set_pinned_flag(ctx, code_id, false)?;
        ctx.emit(pin_event(EVENT_TYPE_UNPIN_CODE, code_id));
        info!(code_id, "unpinned code");
        Ok(())
    }

    /// Pins every code carrying the pinned flag. Run once at startup, since
    /// the engine cache does not survive a restart.
    pub fn initialize_pinned_codes(&self, ctx: &Context<'_>) -> WasmResult<usize> {
        let prefix = [PINNED_CODE_PREFIX];
        let mut pinned = 0;
        for (key, _) in ctx.prefix_range(&prefix, Order::Ascending)? {
            let code_id = crate::store::keys::read_u64(&key[prefix.len()..])
                .ok_or_else(|| WasmError::Invalid("corrupt pinned code key".into()))?;
            let info = self
                .get_code_info(ctx, code_id)?
                .ok_or_else(|| WasmError::NotFound("code info".into()))?;
            self.vm
                .pin(&info.code_hash)
                .map_err(|e| WasmError::PinContractFailed(e.to_string()))?;
            pinned += 1;
        }
        info!(pinned, "initialized pinned codes");
        Ok(pinned)
    }

    // -------------------------------------------------------------------------
    // contracts
    // -------------------------------------------------------------------------

    /// Instantiates `code_id` at a fresh address.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(code_id, creator = %creator))]
    pub fn instantiate(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        creator: &Address,
        admin: Option<&Address>,
        msg: &[u8],
        label: &str,
        funds: &[Coin],
        policy: &dyn AuthorizationPolicy,
    ) -> WasmResult<(Address, Option<Binary>)> {
        self.charge_setup(ctx, code_id, msg.len(), GAS_DESC_SETUP_INSTANTIATE)?;

        let instance_id = Self::next_instance_id(ctx)?;
        let contract = build_contract_address(code_id, instance_id);
        if self.accounts.has_account(ctx, &contract)? {
            return Err(WasmError::AccountExists(contract.to_string()));
        }
        if is_zero(funds) {
            self.accounts.new_account(ctx, &contract)?;
        } else {
            self.transfer_funds(ctx, creator, &contract, funds)?;
        }

        let code = self
            .get_code_info(ctx, code_id)?
            .ok_or_else(|| WasmError::NotFound("code".into()))?;
        if !policy.can_instantiate_contract(&code.instantiate_config, creator) {
            return Err(WasmError::Unauthorized("can not instantiate".into()));
        }

        let env = Env::new(ctx.block(), &contract);
        let info = MessageInfo::new(creator, funds);
        let response = self.call_vm(
            ctx,
            &contract,
            "instantiate",
            |vm, backend, gas| vm.instantiate(&code.code_hash, &env, &info, msg, backend, gas),
            WasmError::InstantiateFailed,
        )?;

        let mut contract_info =
            ContractInfo::new(code_id, creator.clone(), admin.cloned(), label, ctx.block().position());
        let report = self
            .vm
            .analyze_code(&code.code_hash)
            .map_err(|e| WasmError::InstantiateFailed(e.to_string()))?;
        if report.has_ibc_entry_points {
            contract_info.ibc_port_id = Some(self.bind_contract_port(ctx, &contract)?);
        }
        let entry = contract_info.initial_history(msg);
        Self::append_to_contract_history(ctx, &contract, std::slice::from_ref(&entry))?;
        Self::add_to_code_index(ctx, &contract, &entry)?;
        Self::store_contract_info(ctx, &contract, &contract_info)?;
        ctx.emit(instantiate_event(&contract, code_id));
        info!(%contract, "instantiated contract");

        let data = self
            .handle_contract_response(ctx, &contract, contract_info.ibc_port_id.as_deref(), response)
            .map_err(|e| e.wrap("dispatch"))?;
        Ok((contract, data))
    }

    /// Calls the `execute` entry point of `contract`.
    #[instrument(skip_all, fields(contract = %contract, caller = %caller))]
    pub fn execute(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        msg: &[u8],
        funds: &[Coin],
    ) -> WasmResult<Option<Binary>> {
        let (contract_info, code) = self.contract_with_code(ctx, contract)?;
        self.charge_setup(ctx, contract_info.code_id, msg.len(), GAS_DESC_SETUP_EXECUTE)?;
        self.transfer_funds(ctx, caller, contract, funds)?;

        let env = Env::new(ctx.block(), contract);
        let info = MessageInfo::new(caller, funds);
        let response = self.call_vm(
            ctx,
            contract,
            "execute",
            |vm, backend, gas| vm.execute(&code.code_hash, &env, &info, msg, backend, gas),
            WasmError::ExecuteFailed,
        )?;
        ctx.emit(contract_call_event(EVENT_TYPE_EXECUTE, contract));

        self.handle_contract_response(ctx, contract, contract_info.ibc_port_id.as_deref(), response)
            .map_err(|e| e.wrap("dispatch"))
    }

    /// Moves `contract` to `new_code_id` and calls its `migrate` entry point.
    #[instrument(skip_all, fields(contract = %contract, new_code_id))]
    pub fn migrate(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_code_id: CodeId,
        msg: &[u8],
        policy: &dyn AuthorizationPolicy,
    ) -> WasmResult<Option<Binary>> {
        self.charge_setup(ctx, new_code_id, msg.len(), GAS_DESC_SETUP_MIGRATE)?;

        let mut contract_info = self
            .get_contract_info(ctx, contract)?
            .ok_or_else(|| WasmError::InvalidRequest("unknown contract".into()))?;
        if !policy.can_modify_contract(contract_info.admin.as_ref(), caller) {
            return Err(WasmError::Unauthorized("can not migrate".into()));
        }
        let new_code = self
            .get_code_info(ctx, new_code_id)?
            .ok_or_else(|| WasmError::InvalidRequest("unknown code".into()))?;

        let report = self
            .vm
            .analyze_code(&new_code.code_hash)
            .map_err(|e| WasmError::MigrationFailed(e.to_string()))?;
        match (contract_info.ibc_port_id.is_some(), report.has_ibc_entry_points) {
            (true, false) => {
                return Err(WasmError::MigrationFailed(
                    "requires ibc callbacks".into(),
                ));
            }
            (false, true) => {
                contract_info.ibc_port_id = Some(self.bind_contract_port(ctx, contract)?);
            }
            _ => {}
        }

        let env = Env::new(ctx.block(), contract);
        let response = self.call_vm(
            ctx,
            contract,
            "migrate",
            |vm, backend, gas| vm.migrate(&new_code.code_hash, &env, msg, backend, gas),
            WasmError::MigrationFailed,
        )?;

        if let Some(last) = self.last_history_entry(ctx, contract)? {
            Self::remove_from_code_index(ctx, contract, &last)?;
        }
        let entry = contract_info.add_migration(new_code_id, ctx.block().position(), msg);
        Self::append_to_contract_history(ctx, contract, std::slice::from_ref(&entry))?;
        Self::add_to_code_index(ctx, contract, &entry)?;
        Self::store_contract_info(ctx, contract, &contract_info)?;
        ctx.emit(migrate_event(contract, new_code_id));
        info!("migrated contract");

        self.handle_contract_response(ctx, contract, contract_info.ibc_port_id.as_deref(), response)
            .map_err(|e| e.wrap("dispatch"))
    }

    /// Calls the privileged `sudo` entry point.
    #[instrument(skip_all, fields(contract = %contract))]
    pub fn sudo(&self, ctx: &mut Context<'_>, contract: &Address, msg: &[u8]) -> WasmResult<Option<Binary>> {
        let (contract_info, code) = self.contract_with_code(ctx, contract)?;
        self.charge_setup(ctx, contract_info.code_id, msg.len(), GAS_DESC_SETUP_SUDO)?;

        let env = Env::new(ctx.block(), contract);
        let response = self.call_vm(
            ctx,
            contract,
            "sudo",
            |vm, backend, gas| vm.sudo(&code.code_hash, &env, msg, backend, gas),
            WasmError::ExecuteFailed,
        )?;
        ctx.emit(contract_call_event(EVENT_TYPE_SUDO, contract));

        self.handle_contract_response(ctx, contract, contract_info.ibc_port_id.as_deref(), response)
            .map_err(|e| e.wrap("dispatch"))
    }

    /// Delivers a submessage outcome to the `reply` entry point.
    #[instrument(skip_all, fields(contract = %contract, id = reply.id))]
    pub(crate) fn reply(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        reply: &Reply,
    ) -> WasmResult<Option<Binary>> {
        let (contract_info, code) = self.contract_with_code(ctx, contract)?;
        // the instance is loaded already; charge as pinned
        ctx.consume_gas(self.gas_register.reply_cost(true, reply)?, GAS_DESC_SETUP_REPLY)?;

        let env = Env::new(ctx.block(), contract);
        let response = self.call_vm(
            ctx,
            contract,
            "reply",
            |vm, backend, gas| vm.reply(&code.code_hash, &env, reply, backend, gas),
            WasmError::ExecuteFailed,
        )?;
        ctx.emit(contract_call_event(EVENT_TYPE_REPLY, contract));

        self.handle_contract_response(ctx, contract, contract_info.ibc_port_id.as_deref(), response)
            .map_err(|e| e.wrap("dispatch"))
    }

    /// Sets or clears (`None`) the admin of `contract`.
    pub fn set_contract_admin(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_admin: Option<&Address>,
        policy: &dyn AuthorizationPolicy,
    ) -> WasmResult<()> {
        let mut info = self
            .get_contract_info(ctx, contract)?
            .ok_or_else(|| WasmError::InvalidRequest("unknown contract".into()))?;
        if !policy.can_modify_contract(info.admin.as_ref(), caller) {
            return Err(WasmError::Unauthorized("can not modify contract".into()));
        }
        info.admin = new_admin.cloned();
        Self::store_contract_info(ctx, contract, &info)?;
        ctx.emit(update_admin_event(contract, new_admin));
        info!(%contract, cleared = new_admin.is_none(), "updated contract admin");
        Ok(())
    }

    /// Replaces the opaque extension of a contract record.
    pub fn set_contract_info_extension(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        extension: Option<Vec<u8>>,
    ) -> WasmResult<()> {
        let mut info = self
            .get_contract_info(ctx, contract)?
            .ok_or_else(|| WasmError::NotFound("contract info".into()))?;
        info.extension = extension;
        Self::store_contract_info(ctx, contract, &info)
    }

    // -------------------------------------------------------------------------
    // genesis import
    // -------------------------------------------------------------------------

    /// Stores code under a fixed id. The code must hash to `info.code_hash`.
    pub fn import_code(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        info: &CodeInfo,
        wasm: &[u8],
    ) -> WasmResult<()> {
        if self.get_code_info(ctx, code_id)?.is_some() {
            return Err(WasmError::Duplicate(format!("duplicate code: {code_id}")));
        }
        let code = uncompress(wasm, self.config.max_wasm_size)?;
        let code_hash = self
            .vm
            .create(&code)
            .map_err(|e| WasmError::CreateFailed(e.to_string()))?;
        if code_hash != info.code_hash {
            return Err(WasmError::Invalid("code hashes not same".into()));
        }
        Self::store_code_info(ctx, code_id, info)?;
        // later uploads must not reuse imported ids
        if self.next_code_id(ctx)? <= code_id {
            let next = code_id
                .checked_add(1)
                .ok_or_else(|| WasmError::Invalid("sequence overflow".into()))?;
            ctx.set(&sequence_key(KEY_LAST_CODE_ID), &next.to_be_bytes())?;
        }
        Ok(())
    }

    /// Stores a contract with its history and raw state.
    pub fn import_contract(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        info: &ContractInfo,
        state: &[KvPair],
        history: &[ContractCodeHistoryEntry],
    ) -> WasmResult<()> {
        if self.get_code_info(ctx, info.code_id)?.is_none() {
            return Err(WasmError::NotFound("code info".into()));
        }
        if self.has_contract_info(ctx, contract)? {
            return Err(WasmError::Duplicate(format!("contract: {contract}")));
        }
        let last = history
            .last()
            .ok_or_else(|| WasmError::Empty("contract history".into()))?;
        Self::append_to_contract_history(ctx, contract, history)?;
        Self::add_to_code_index(ctx, contract, last)?;
        Self::store_contract_info(ctx, contract, info)?;

        let prefix = contract_store_prefix(contract);
        for (key, value) in state {
            let mut full = prefix.clone();
            full.extend_from_slice(key);
            ctx.set(&full, value)?;
        }
        Ok(())
    }
}

// =============================================================================
// CALLBACKS
// =============================================================================

impl Replyer for Keeper {
    fn reply(&self, ctx: &mut Context<'_>, contract: &Address, reply: &Reply) -> WasmResult<Option<Binary>> {
        Keeper::reply(self, ctx, contract, reply)
    }
}

/// Operations contracts trigger through their messages run under the default
/// policy, with the contract as actor.
impl ContractHost for Keeper {
    fn instantiate(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        creator: &Address,
        admin: Option<&Address>,
        msg: &[u8],
        label: &str,
        funds: &[Coin],
    ) -> WasmResult<(Address, Option<Binary>)> {
        Keeper::instantiate(
            self,
            ctx,
            code_id,
            creator,
            admin,
            msg,
            label,
            funds,
            &DefaultAuthorizationPolicy,
        )
    }

    fn execute(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        msg: &[u8],
        funds: &[Coin],
    ) -> WasmResult<Option<Binary>> {
        Keeper::execute(self, ctx, contract, caller, msg, funds)
    }

    fn migrate(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_code_id: CodeId,
        msg: &[u8],
    ) -> WasmResult<Option<Binary>> {
        Keeper::migrate(self, ctx, contract, caller, new_code_id, msg, &DefaultAuthorizationPolicy)
    }

    fn update_admin(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_admin: Option<&Address>,
    ) -> WasmResult<()> {
        self.set_contract_admin(ctx, contract, caller, new_admin, &DefaultAuthorizationPolicy)
    }
}

// =============================================================================
// TESTS
// =============================================================================
