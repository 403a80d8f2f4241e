//! # Query Handler
//!
//! Routes queries issued by contracts to pluggable handlers and runs nested
//! smart queries with a bounded depth.
//!
//! Every contract-triggered query runs in its own scope, which is always
//! discarded, under a meter sized from the VM gas the engine granted. What the
//! query consumed is charged to the caller even when it fails.

use super::Keeper;
use crate::context::{Context, EventManager};
use crate::domain::entities::Env;
use crate::domain::gas_meter::GasMeter;
use crate::domain::invariants::check_query_depth;
use crate::domain::messages::{
    AllBalanceResponse, AllValidatorsResponse, BalanceResponse, BankQuery, BondedDenomResponse,
    ContractInfoResponse, IbcQuery, PortIdResponse, QueryRequest, StakingQuery, ValidatorResponse,
    WasmQuery,
};
use crate::domain::value_objects::{Address, Binary};
use crate::errors::{redact_error, QuerierError, SystemError, WasmError, WasmResult};
use crate::metrics;
use crate::ports::inbound::ContractQuerier;
use crate::ports::outbound::{BankView, StakingView};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Descriptor of gas charged to the caller of a sub-query.
pub const GAS_DESC_SUB_QUERY: &str = "contract sub-query";

/// Descriptor of the instance cost of a smart query.
pub const GAS_DESC_QUERY_SETUP: &str = "Loading CosmWasm module: query";

// =============================================================================
// PLUGINS
// =============================================================================

/// Bank query handler.
pub type BankQueryHandler = Arc<dyn Fn(&Context<'_>, &BankQuery) -> WasmResult<Vec<u8>> + Send + Sync>;

/// Staking query handler.
pub type StakingQueryHandler =
    Arc<dyn Fn(&Context<'_>, &StakingQuery) -> WasmResult<Vec<u8>> + Send + Sync>;

/// Contract query handler. Smart queries re-enter the keeper through the querier.
pub type WasmQueryHandler = Arc<
    dyn Fn(&mut Context<'_>, &dyn ContractQuerier, &WasmQuery) -> WasmResult<Vec<u8>> + Send + Sync,
>;

/// IBC query handler; gets the calling contract.
pub type IbcQueryHandler = Arc<
    dyn Fn(&Context<'_>, &dyn ContractQuerier, &Address, &IbcQuery) -> WasmResult<Vec<u8>>
        + Send
        + Sync,
>;

/// Raw path/data query handler.
pub type StargateQueryHandler =
    Arc<dyn Fn(&Context<'_>, &str, &Binary) -> WasmResult<Vec<u8>> + Send + Sync>;

/// Application specific query handler; gets the calling contract.
pub type CustomQueryHandler =
    Arc<dyn Fn(&Context<'_>, &Address, &serde_json::Value) -> WasmResult<Vec<u8>> + Send + Sync>;

/// Routing table for contract queries, one optional handler per kind.
#[derive(Clone, Default)]
pub struct QueryPlugins {
    /// Bank queries.
    pub bank: Option<BankQueryHandler>,
    /// Staking queries.
    pub staking: Option<StakingQueryHandler>,
    /// Contract queries.
    pub wasm: Option<WasmQueryHandler>,
    /// IBC queries.
    pub ibc: Option<IbcQueryHandler>,
    /// Raw path queries.
    pub stargate: Option<StargateQueryHandler>,
    /// Application specific queries.
    pub custom: Option<CustomQueryHandler>,
}

impl fmt::Debug for QueryPlugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPlugins")
            .field("bank", &self.bank.is_some())
            .field("staking", &self.staking.is_some())
            .field("wasm", &self.wasm.is_some())
            .field("ibc", &self.ibc.is_some())
            .field("stargate", &self.stargate.is_some())
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl QueryPlugins {
    /// Bank, staking, wasm and ibc handlers. Stargate and custom stay unset.
    #[must_use]
    pub fn defaults(bank: Arc<dyn BankView>, staking: Arc<dyn StakingView>) -> Self {
        Self {
            bank: Some(bank_query_handler(bank)),
            staking: Some(staking_query_handler(staking)),
            wasm: Some(Arc::new(wasm_query)),
            ibc: Some(Arc::new(ibc_query)),
            stargate: None,
            custom: None,
        }
    }

    /// Handlers set in `other` replace ours; the rest are kept.
    #[must_use]
    pub fn merge(self, other: QueryPlugins) -> Self {
        Self {
            bank: other.bank.or(self.bank),
            staking: other.staking.or(self.staking),
            wasm: other.wasm.or(self.wasm),
            ibc: other.ibc.or(self.ibc),
            stargate: other.stargate.or(self.stargate),
            custom: other.custom.or(self.custom),
        }
    }

    /// Sends `request` to the handler of its kind.
    pub fn route(
        &self,
        ctx: &mut Context<'_>,
        querier: &dyn ContractQuerier,
        caller: &Address,
        request: &QueryRequest,
    ) -> WasmResult<Vec<u8>> {
        let unsupported = || {
            WasmError::System(SystemError::UnsupportedRequest {
                kind: request.kind().to_string(),
            })
        };
        match request {
            QueryRequest::Bank(query) => {
                let handler = self.bank.as_ref().ok_or_else(unsupported)?;
                handler(&*ctx, query)
            }
            QueryRequest::Staking(query) => {
                let handler = self.staking.as_ref().ok_or_else(unsupported)?;
                handler(&*ctx, query)
            }
            QueryRequest::Wasm(query) => {
                let handler = self.wasm.as_ref().ok_or_else(unsupported)?;
                handler(ctx, querier, query)
            }
            QueryRequest::Ibc(query) => {
                let handler = self.ibc.as_ref().ok_or_else(unsupported)?;
                handler(&*ctx, querier, caller, query)
            }
            QueryRequest::Stargate { path, data } => {
                let handler = self.stargate.as_ref().ok_or_else(unsupported)?;
                handler(&*ctx, path, data)
            }
            QueryRequest::Custom(value) => {
                let handler = self.custom.as_ref().ok_or_else(unsupported)?;
                handler(&*ctx, caller, value)
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> WasmResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        WasmError::System(SystemError::InvalidResponse {
            error: e.to_string(),
            response: String::new(),
        })
    })
}

fn bank_query_handler(bank: Arc<dyn BankView>) -> BankQueryHandler {
    Arc::new(move |ctx: &Context<'_>, query: &BankQuery| match query {
        BankQuery::Balance { address, denom } => {
            let addr = Address::from_bech32(address)?;
            to_json(&BalanceResponse {
                amount: bank.balance(ctx, &addr, denom)?,
            })
        }
        BankQuery::AllBalances { address } => {
            let addr = Address::from_bech32(address)?;
            to_json(&AllBalanceResponse {
                amount: bank.all_balances(ctx, &addr)?,
            })
        }
    })
}

fn staking_query_handler(staking: Arc<dyn StakingView>) -> StakingQueryHandler {
    Arc::new(move |_ctx: &Context<'_>, query: &StakingQuery| match query {
        StakingQuery::BondedDenom {} => to_json(&BondedDenomResponse {
            denom: staking.bonded_denom(),
        }),
        StakingQuery::AllValidators {} => to_json(&AllValidatorsResponse {
            validators: staking.all_validators(),
        }),
        StakingQuery::Validator { address } => to_json(&ValidatorResponse {
            validator: staking.validator(address),
        }),
    })
}

fn wasm_query(
    ctx: &mut Context<'_>,
    querier: &dyn ContractQuerier,
    query: &WasmQuery,
) -> WasmResult<Vec<u8>> {
    match query {
        WasmQuery::Smart { contract_addr, msg } => {
            let addr = Address::from_bech32(contract_addr)?;
            querier.query_smart(ctx, &addr, msg.as_slice())
        }
        WasmQuery::Raw { contract_addr, key } => {
            let addr = Address::from_bech32(contract_addr)?;
            Ok(querier
                .query_raw(ctx, &addr, key.as_slice())?
                .unwrap_or_default())
        }
        WasmQuery::ContractInfo { contract_addr } => {
            let addr = Address::from_bech32(contract_addr)?;
            let info = querier
                .contract_info_response(ctx, &addr)?
                .ok_or_else(|| WasmError::NoSuchContract {
                    addr: contract_addr.clone(),
                })?;
            to_json(&info)
        }
    }
}

fn ibc_query(
    ctx: &Context<'_>,
    querier: &dyn ContractQuerier,
    caller: &Address,
    query: &IbcQuery,
) -> WasmResult<Vec<u8>> {
    match query {
        IbcQuery::PortId {} => {
            let port_id = querier
                .contract_info_response(ctx, caller)?
                .and_then(|info| info.ibc_port)
                .unwrap_or_default();
            to_json(&PortIdResponse { port_id })
        }
        IbcQuery::ListChannels { .. } => Err(WasmError::System(SystemError::UnsupportedRequest {
            kind: "ibc list_channels".into(),
        })),
    }
}

/// What a contract may see of a failed query.
///
/// System errors and unknown contracts pass verbatim, the rest is redacted.
pub(crate) fn to_querier_error(err: &WasmError) -> QuerierError {
    match err.root() {
        WasmError::System(sys) => QuerierError::System(sys.clone()),
        WasmError::NoSuchContract { addr } => {
            QuerierError::System(SystemError::NoSuchContract { addr: addr.clone() })
        }
        _ => {
            warn!(error = %err, "redacting query error");
            QuerierError::Redacted(redact_error(err))
        }
    }
}

// =============================================================================
// KEEPER QUERIES
// =============================================================================

impl Keeper {
    /// Runs a contract-triggered query in a discarded scope.
    ///
    /// `gas_limit` is in VM units. Fatal errors are returned as such; the
    /// caller decides whether they abort the whole call.
    pub fn handle_query(
        &self,
        ctx: &mut Context<'_>,
        caller: &Address,
        request: &QueryRequest,
        gas_limit: u64,
    ) -> WasmResult<Vec<u8>> {
        let scope = ctx.open_scope()?;
        let mut sub_meter = GasMeter::new(self.gas_register.from_vm_gas(gas_limit));
        let mut events = EventManager::new();
        let result = {
            let mut sub = ctx.branch_with_meter(scope, &mut events, &mut sub_meter);
            self.query_plugins.route(&mut sub, self, caller, request)
        };
        let discarded = ctx.discard_scope(scope);
        debug!(kind = request.kind(), gas = sub_meter.consumed(), "sub-query done");
        ctx.consume_gas(sub_meter.consumed(), GAS_DESC_SUB_QUERY)?;
        discarded?;
        result
    }

    /// Calls the `query` entry point of `contract`, one level deeper.
    #[instrument(skip_all, fields(contract = %contract, depth = ctx.query_depth() + 1))]
    pub fn query_smart(&self, ctx: &mut Context<'_>, contract: &Address, req: &[u8]) -> WasmResult<Vec<u8>> {
        let mut ctx = ctx.nested_query();
        if let Err(err) = check_query_depth(ctx.query_depth(), self.config.max_query_stack_size) {
            metrics::record_query_depth_rejection();
            return Err(err);
        }
        let info = self
            .get_contract_info(&ctx, contract)?
            .ok_or_else(|| WasmError::NoSuchContract {
                addr: contract.to_string(),
            })?;
        let code = self
            .get_code_info(&ctx, info.code_id)?
            .ok_or_else(|| WasmError::NotFound("code info".into()))?;
        let pinned = self.is_pinned_code(&ctx, info.code_id)?;
        ctx.consume_gas(
            self.gas_register.instantiate_cost(pinned, req.len())?,
            GAS_DESC_QUERY_SETUP,
        )?;

        let env = Env::new(ctx.block(), contract);
        let result = self.call_vm(
            &mut ctx,
            contract,
            "query",
            |vm, backend, gas| vm.query(&code.code_hash, &env, req, backend, gas),
            WasmError::QueryFailed,
        );
        if matches!(result, Err(WasmError::QueryFailed(_))) && !ctx.gas().is_infinite() {
            // a failed query burns what is left of its budget
            let remaining = ctx.gas().remaining();
            ctx.consume_gas(remaining, GAS_DESC_QUERY_SETUP)?;
        }
        result
    }

    /// Public metadata of `contract`.
    pub fn contract_info_response(
        &self,
        ctx: &Context<'_>,
        contract: &Address,
    ) -> WasmResult<Option<ContractInfoResponse>> {
        let Some(info) = self.get_contract_info(ctx, contract)? else {
            return Ok(None);
        };
        Ok(Some(ContractInfoResponse {
            code_id: info.code_id,
            creator: info.creator.to_string(),
            admin: info.admin.as_ref().map(ToString::to_string),
            pinned: self.is_pinned_code(ctx, info.code_id)?,
            ibc_port: info.ibc_port_id,
        }))
    }
}

impl ContractQuerier for Keeper {
    fn query_smart(&self, ctx: &mut Context<'_>, contract: &Address, req: &[u8]) -> WasmResult<Vec<u8>> {
        Keeper::query_smart(self, ctx, contract, req)
    }

    fn query_raw(&self, ctx: &Context<'_>, contract: &Address, key: &[u8]) -> WasmResult<Option<Vec<u8>>> {
        Keeper::query_raw(self, ctx, contract, key)
    }

    fn contract_info_response(
        &self,
        ctx: &Context<'_>,
        contract: &Address,
    ) -> WasmResult<Option<ContractInfoResponse>> {
        Keeper::contract_info_response(self, ctx, contract)
    }
}
