//! # Message Dispatcher
//!
//! Runs the messages a contract returned.
//!
//! Each submessage gets its own scope and event sink. Its state and events
//! reach the caller only when it succeeds; the reply entry point then sees
//! either the filtered events and first data output, or a redacted error.

use super::Keeper;
use crate::context::{Context, EventManager};
use crate::domain::gas_meter::GasMeter;
use crate::domain::messages::{CosmosMsg, Reply, ReplyOn, SubMsg, SubMsgResponse, SubMsgResult};
use crate::domain::value_objects::{Address, Binary};
use crate::errors::{redact_error, WasmError, WasmResult};
use crate::events::filter_message_events;
use crate::ports::outbound::DispatchOutput;
use crate::store::ScopeId;
use tracing::{debug, warn};

/// Descriptor of gas a limited submessage charges to its caller.
pub const GAS_DESC_SUBMSG: &str = "From limited Sub-Message";

/// Descriptor of the gas limit charged when a submessage runs dry.
pub const GAS_DESC_SUBMSG_OOG: &str = "Sub-Message OutOfGas";

impl Keeper {
    /// Dispatches plain messages at the caller's gas. The first error aborts.
    pub fn dispatch_messages(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        ibc_port: Option<&str>,
        msgs: &[CosmosMsg],
    ) -> WasmResult<()> {
        for msg in msgs {
            let output = self
                .messenger
                .dispatch_msg(ctx, self, contract, ibc_port, msg)?;
            ctx.events().emit_all(filter_message_events(output.events));
        }
        Ok(())
    }

    /// Dispatches submessages and delivers replies.
    ///
    /// Returns the data of the last reply that set any.
    pub fn dispatch_submessages(
        &self,
        ctx: &mut Context<'_>,
        contract: &Address,
        ibc_port: Option<&str>,
        msgs: &[SubMsg],
    ) -> WasmResult<Option<Binary>> {
        let mut final_data = None;
        for msg in msgs {
            let scope = ctx.open_scope()?;
            let mut sub_events = EventManager::new();
            let dispatched = self.dispatch_in_scope(ctx, scope, &mut sub_events, contract, ibc_port, msg);

            let result = match dispatched {
                Ok(output) => {
                    ctx.commit_scope(scope)?;
                    let mut events = sub_events.into_events();
                    events.extend(output.events);
                    let events = filter_message_events(events);
                    ctx.events().emit_all(events.clone());
                    Ok(SubMsgResponse {
                        events,
                        data: output.data.into_iter().next(),
                    })
                }
                Err(err) if err.is_fatal() => {
                    ctx.discard_scope(scope)?;
                    return Err(err);
                }
                Err(err) => {
                    ctx.discard_scope(scope)?;
                    Err(err)
                }
            };

            let wants_reply = match msg.reply_on {
                ReplyOn::Always => true,
                ReplyOn::Success => result.is_ok(),
                ReplyOn::Error => result.is_err(),
                ReplyOn::Never => false,
            };
            if !wants_reply {
                // no reply: a failure belongs to the caller
                result?;
                continue;
            }

            let result = match result {
                Ok(response) => SubMsgResult::Ok(response),
                Err(err) => {
                    self.log_debug_error("submessage", &err);
                    let redacted = redact_error(&err);
                    warn!(id = msg.id, error = %redacted, "submessage failed, replying");
                    SubMsgResult::Err(redacted)
                }
            };
            let reply = Reply { id: msg.id, result };
            let data = Keeper::reply(self, ctx, contract, &reply).map_err(|e| e.wrap("reply"))?;
            if data.is_some() {
                final_data = data;
            }
        }
        Ok(final_data)
    }

    /// Runs one submessage in `scope`, under its own meter when it has a
    /// limit below what the caller has left.
    fn dispatch_in_scope(
        &self,
        ctx: &mut Context<'_>,
        scope: ScopeId,
        events: &mut EventManager,
        contract: &Address,
        ibc_port: Option<&str>,
        msg: &SubMsg,
    ) -> WasmResult<DispatchOutput> {
        let limit = msg.gas_limit.filter(|limit| *limit < ctx.gas().remaining());
        let Some(limit) = limit else {
            let mut sub = ctx.branch(scope, events);
            return self
                .messenger
                .dispatch_msg(&mut sub, self, contract, ibc_port, &msg.msg);
        };

        let mut sub_meter = GasMeter::new(limit);
        let result = {
            let mut sub = ctx.branch_with_meter(scope, events, &mut sub_meter);
            self.messenger
                .dispatch_msg(&mut sub, self, contract, ibc_port, &msg.msg)
        };
        match result {
            Err(err) if err.is_out_of_gas() => {
                debug!(id = msg.id, limit, "submessage hit its gas limit");
                ctx.consume_gas(limit, GAS_DESC_SUBMSG_OOG)?;
                Err(WasmError::SubMsgGasLimit { limit })
            }
            other => {
                ctx.consume_gas(sub_meter.consumed(), GAS_DESC_SUBMSG)?;
                other
            }
        }
    }
}
