//! # Execution Context
//!
//! The per-call view every keeper operation receives: a store scope, the gas
//! meter that pays for the call, the event sink and the block environment.
//!
//! Nested calls derive a new `Context` from the current one. Derived contexts
//! reborrow the parent's arena, so the parent is usable again once the child
//! is dropped.

use crate::domain::entities::BlockInfo;
use crate::domain::gas::Gas;
use crate::domain::gas_meter::GasMeter;
use crate::domain::messages::Event;
use crate::errors::WasmResult;
use crate::store::{KvPair, Order, ScopeId, StateArena, ROOT_SCOPE};

/// Collects events emitted during a call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventManager {
    events: Vec<Event>,
}

impl EventManager {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one event.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Appends events in order.
    pub fn emit_all(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    /// Events so far.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Takes the events out.
    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Per-call execution context.
pub struct Context<'a> {
    store: &'a mut StateArena,
    scope: ScopeId,
    gas_meter: &'a mut GasMeter,
    events: &'a mut EventManager,
    block: &'a BlockInfo,
    query_depth: u32,
}

impl<'a> Context<'a> {
    /// Top-level context in the root scope.
    pub fn new(
        store: &'a mut StateArena,
        gas_meter: &'a mut GasMeter,
        events: &'a mut EventManager,
        block: &'a BlockInfo,
    ) -> Self {
        Self {
            store,
            scope: ROOT_SCOPE,
            gas_meter,
            events,
            block,
            query_depth: 0,
        }
    }

    /// Child context in `scope` with its own event sink, paying with the same meter.
    pub fn branch<'b>(&'b mut self, scope: ScopeId, events: &'b mut EventManager) -> Context<'b> {
        Context {
            store: &mut *self.store,
            scope,
            gas_meter: &mut *self.gas_meter,
            events,
            block: self.block,
            query_depth: self.query_depth,
        }
    }

    /// Child context in `scope` with its own event sink and gas meter.
    pub fn branch_with_meter<'b>(
        &'b mut self,
        scope: ScopeId,
        events: &'b mut EventManager,
        gas_meter: &'b mut GasMeter,
    ) -> Context<'b> {
        Context {
            store: &mut *self.store,
            scope,
            gas_meter,
            events,
            block: self.block,
            query_depth: self.query_depth,
        }
    }

    /// Same scope, meter and sink, one query level deeper.
    pub fn nested_query<'b>(&'b mut self) -> Context<'b> {
        Context {
            store: &mut *self.store,
            scope: self.scope,
            gas_meter: &mut *self.gas_meter,
            events: &mut *self.events,
            block: self.block,
            query_depth: self.query_depth.saturating_add(1),
        }
    }

    /// Current store scope.
    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Block environment.
    #[must_use]
    pub fn block(&self) -> &BlockInfo {
        self.block
    }

    /// Nesting level of smart queries; 0 outside queries.
    #[must_use]
    pub fn query_depth(&self) -> u32 {
        self.query_depth
    }

    /// The meter paying for this call.
    pub fn gas_meter(&mut self) -> &mut GasMeter {
        self.gas_meter
    }

    /// Read access to the meter.
    #[must_use]
    pub fn gas(&self) -> &GasMeter {
        self.gas_meter
    }

    /// Charges the meter.
    pub fn consume_gas(&mut self, amount: Gas, descriptor: &str) -> WasmResult<()> {
        self.gas_meter.consume(amount, descriptor)
    }

    /// The event sink.
    pub fn events(&mut self) -> &mut EventManager {
        self.events
    }

    /// Emits one event.
    pub fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }

    // -------------------------------------------------------------------------
    // store access
    // -------------------------------------------------------------------------

    /// Opens a child scope of the current one.
    pub fn open_scope(&mut self) -> WasmResult<ScopeId> {
        Ok(self.store.open_scope(self.scope)?)
    }

    /// Commits `scope` into its parent.
    pub fn commit_scope(&mut self, scope: ScopeId) -> WasmResult<()> {
        Ok(self.store.commit(scope)?)
    }

    /// Drops `scope`.
    pub fn discard_scope(&mut self, scope: ScopeId) -> WasmResult<()> {
        Ok(self.store.discard(scope)?)
    }

    /// Reads `key` in the current scope.
    pub fn get(&self, key: &[u8]) -> WasmResult<Option<Vec<u8>>> {
        Ok(self.store.get(self.scope, key)?)
    }

    /// Returns true if `key` is set in the current scope.
    pub fn has(&self, key: &[u8]) -> WasmResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Writes `key` in the current scope.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> WasmResult<()> {
        Ok(self.store.set(self.scope, key, value)?)
    }

    /// Deletes `key` in the current scope.
    pub fn delete(&mut self, key: &[u8]) -> WasmResult<()> {
        Ok(self.store.delete(self.scope, key)?)
    }

    /// Range read in the current scope.
    pub fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> WasmResult<Vec<KvPair>> {
        Ok(self.store.range(self.scope, start, end, order)?)
    }

    /// Prefix read in the current scope.
    pub fn prefix_range(&self, prefix: &[u8], order: Order) -> WasmResult<Vec<KvPair>> {
        Ok(self.store.prefix_range(self.scope, prefix, order)?)
    }
}
