//! [`PermissionedKeeper`]: the lifecycle operations exposed to transaction
//! handlers and governance, each checked by one authorization policy.

use super::Keeper;
use crate::adapters::authz::{DefaultAuthorizationPolicy, GovAuthorizationPolicy};
use crate::context::Context;
use crate::domain::entities::{AccessConfig, CodeInfo, ContractCodeHistoryEntry, ContractInfo};
use crate::domain::value_objects::{Address, Binary, Checksum, Coin, CodeId};
use crate::errors::WasmResult;
use crate::ports::inbound::{ContractOps, ContractViews};
use crate::ports::outbound::AuthorizationPolicy;
use std::sync::Arc;

/// A keeper bound to an authorization policy.
#[derive(Clone, Debug)]
pub struct PermissionedKeeper {
    keeper: Arc<Keeper>,
    policy: Arc<dyn AuthorizationPolicy>,
}

impl PermissionedKeeper {
    /// Wraps `keeper` with `policy`.
    #[must_use]
    pub fn new(keeper: Arc<Keeper>, policy: Arc<dyn AuthorizationPolicy>) -> Self {
        Self { keeper, policy }
    }

    /// Access configs and contract admins apply.
    #[must_use]
    pub fn with_default_policy(keeper: Arc<Keeper>) -> Self {
        Self::new(keeper, Arc::new(DefaultAuthorizationPolicy))
    }

    /// Everything is allowed.
    #[must_use]
    pub fn with_gov_policy(keeper: Arc<Keeper>) -> Self {
        Self::new(keeper, Arc::new(GovAuthorizationPolicy))
    }

    /// The wrapped keeper.
    #[must_use]
    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }
}

impl ContractOps for PermissionedKeeper {
    fn create(
        &self,
        ctx: &mut Context<'_>,
        creator: &Address,
        wasm: &[u8],
        instantiate_permission: Option<&AccessConfig>,
    ) -> WasmResult<(CodeId, Checksum)> {
        self.keeper
            .create(ctx, creator, wasm, instantiate_permission, self.policy.as_ref())
    }

    fn instantiate(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        creator: &Address,
        admin: Option<&Address>,
        init_msg: &[u8],
        label: &str,
        funds: &[Coin],
    ) -> WasmResult<(Address, Option<Binary>)> {
        self.keeper.instantiate(
            ctx,
            code_id,
            creator,
            admin,
            init_msg,
            label,
            funds,
            self.policy.as_ref(),
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
        self.keeper.execute(ctx, contract, caller, msg, funds)
    }

    fn migrate(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_code_id: CodeId,
        msg: &[u8],
    ) -> WasmResult<Option<Binary>> {
        self.keeper
            .migrate(ctx, contract, caller, new_code_id, msg, self.policy.as_ref())
    }

    fn sudo(&self, ctx: &mut Context<'_>, contract: &Address, msg: &[u8]) -> WasmResult<Option<Binary>> {
        self.keeper.sudo(ctx, contract, msg)
    }

    fn update_contract_admin(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        caller: &Address,
        new_admin: &Address,
    ) -> WasmResult<()> {
        self.keeper
            .set_contract_admin(ctx, contract, caller, Some(new_admin), self.policy.as_ref())
    }

    fn clear_contract_admin(&self, ctx: &mut Context<'_>, contract: &Address, caller: &Address) -> WasmResult<()> {
        self.keeper
            .set_contract_admin(ctx, contract, caller, None, self.policy.as_ref())
    }

    fn pin_code(&self, ctx: &mut Context<'_>, code_id: CodeId) -> WasmResult<()> {
        self.keeper.pin_code(ctx, code_id)
    }

    fn unpin_code(&self, ctx: &mut Context<'_>, code_id: CodeId) -> WasmResult<()> {
        self.keeper.unpin_code(ctx, code_id)
    }

    fn set_contract_info_extension(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        extension: Option<Vec<u8>>,
    ) -> WasmResult<()> {
        self.keeper.set_contract_info_extension(ctx, contract, extension)
    }

    fn set_access_config(
        &self,
        ctx: &mut Context<'_>,
        code_id: CodeId,
        caller: &Address,
        config: AccessConfig,
    ) -> WasmResult<()> {
        self.keeper
            .set_access_config(ctx, code_id, caller, config, self.policy.as_ref())
    }
}

impl ContractViews for PermissionedKeeper {
    fn get_contract_info(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<Option<ContractInfo>> {
        self.keeper.get_contract_info(ctx, contract)
    }

    fn get_code_info(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Option<CodeInfo>> {
        self.keeper.get_code_info(ctx, code_id)
    }

    fn get_contract_history(&self, ctx: &Context<'_>, contract: &Address) -> WasmResult<Vec<ContractCodeHistoryEntry>> {
        self.keeper.get_contract_history(ctx, contract)
    }

    fn contracts_by_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<Vec<Address>> {
        self.keeper.iterate_contracts_by_code(ctx, code_id)
    }

    fn is_pinned_code(&self, ctx: &Context<'_>, code_id: CodeId) -> WasmResult<bool> {
        self.keeper.is_pinned_code(ctx, code_id)
    }
}
