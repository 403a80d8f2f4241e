//! The [`Backend`] handed to the engine for one call.
//!
//! Storage is confined to the contract namespace. Queries go through the
//! keeper's query handler; a fatal gas condition raised there is kept here so
//! that the keeper can re-raise it after the engine returns, whatever the
//! engine made of the aborted query.

use super::query::to_querier_error;
use super::Keeper;
use crate::context::Context;
use crate::domain::messages::QueryRequest;
use crate::domain::value_objects::Address;
use crate::errors::{QuerierError, VmError, WasmError};
use crate::ports::outbound::{Backend, Querier, Storage};
use crate::store::arena::prefix_end;
use crate::store::keys::contract_store_prefix;
use crate::store::{KvPair, Order};
use tracing::warn;

pub(crate) struct ContractBackend<'k, 'c, 'a> {
    keeper: &'k Keeper,
    ctx: &'c mut Context<'a>,
    contract: Address,
    prefix: Vec<u8>,
    fatal: Option<WasmError>,
}

impl<'k, 'c, 'a> ContractBackend<'k, 'c, 'a> {
    pub(crate) fn new(keeper: &'k Keeper, ctx: &'c mut Context<'a>, contract: &Address) -> Self {
        Self {
            keeper,
            ctx,
            contract: contract.clone(),
            prefix: contract_store_prefix(contract),
            fatal: None,
        }
    }

    /// Fatal error raised by a nested query, if any.
    pub(crate) fn into_fatal(self) -> Option<WasmError> {
        self.fatal
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

fn backend_err(err: &WasmError) -> VmError {
    VmError::Backend(err.to_string())
}

impl Storage for ContractBackend<'_, '_, '_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VmError> {
        self.ctx.get(&self.full_key(key)).map_err(|e| backend_err(&e))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError> {
        let full = self.full_key(key);
        self.ctx.set(&full, value).map_err(|e| backend_err(&e))
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), VmError> {
        let full = self.full_key(key);
        self.ctx.delete(&full).map_err(|e| backend_err(&e))
    }

    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Result<Vec<KvPair>, VmError> {
        let start = start.map_or_else(|| self.prefix.clone(), |s| self.full_key(s));
        let end = match end {
            Some(e) => Some(self.full_key(e)),
            None => prefix_end(&self.prefix),
        };
        let strip = self.prefix.len();
        Ok(self
            .ctx
            .range(Some(&start), end.as_deref(), order)
            .map_err(|e| backend_err(&e))?
            .into_iter()
            .map(|(key, value)| (key[strip..].to_vec(), value))
            .collect())
    }
}

impl Querier for ContractBackend<'_, '_, '_> {
    fn query(&mut self, request: &QueryRequest, gas_limit: u64) -> Result<Vec<u8>, QuerierError> {
        match self
            .keeper
            .handle_query(self.ctx, &self.contract, request, gas_limit)
        {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.is_fatal() => {
                // a sub-query running dry stays local; the caller's meter running dry does not
                if matches!(err, WasmError::GasOverflow { .. }) || self.ctx.gas().is_past_limit() {
                    warn!(contract = %self.contract, error = %err, "fatal error in contract query");
                    self.fatal.get_or_insert(err);
                }
                Err(QuerierError::Aborted)
            }
            Err(err) => Err(to_querier_error(&err)),
        }
    }
}

impl Backend for ContractBackend<'_, '_, '_> {
    fn gas_consumed(&self) -> u64 {
        self.keeper
            .gas_register()
            .to_vm_gas(self.ctx.gas().consumed())
            .unwrap_or(u64::MAX)
    }
}
