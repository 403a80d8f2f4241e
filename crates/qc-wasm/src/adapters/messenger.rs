//! # Messengers
//!
//! Deliver contract messages to the module that handles them.
//!
//! `DefaultMessenger` covers bank sends and the contract module messages.
//! `MessageHandlerChain` lets a host put its own handlers in front of (or
//! behind) the default one; a handler that does not know a message answers
//! `UnknownMsg` and the next one is tried.

use crate::context::Context;
use crate::domain::messages::{BankMsg, CosmosMsg, ExecuteResponse, InstantiateResponse, WasmMsg};
use crate::domain::value_objects::{Address, Binary};
use crate::errors::{WasmError, WasmResult};
use crate::ports::inbound::ContractHost;
use crate::ports::outbound::{CoinTransferrer, DispatchOutput, Messenger};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Handler for application specific messages.
pub type CustomMsgHandler =
    Arc<dyn Fn(&mut Context<'_>, &Address, &serde_json::Value) -> WasmResult<DispatchOutput> + Send + Sync>;

fn encode<T: Serialize>(value: &T) -> WasmResult<Binary> {
    serde_json::to_vec(value)
        .map(Binary::from)
        .map_err(|e| WasmError::Invalid(format!("encode response: {e}")))
}

fn parse_addr(text: &str) -> WasmResult<Address> {
    Address::from_bech32(text)
}

/// Bank and contract module messages.
pub struct DefaultMessenger {
    bank: Arc<dyn CoinTransferrer>,
    custom: Option<CustomMsgHandler>,
}

impl fmt::Debug for DefaultMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultMessenger")
            .field("custom", &self.custom.is_some())
            .finish_non_exhaustive()
    }
}

impl DefaultMessenger {
    /// Messenger moving coins through `bank`.
    pub fn new(bank: Arc<dyn CoinTransferrer>) -> Self {
        Self { bank, custom: None }
    }

    /// Routes `Custom` messages to `handler`.
    #[must_use]
    pub fn with_custom_handler(mut self, handler: CustomMsgHandler) -> Self {
        self.custom = Some(handler);
        self
    }

    fn dispatch_bank(&self, ctx: &mut Context<'_>, contract: &Address, msg: &BankMsg) -> WasmResult<DispatchOutput> {
        match msg {
            BankMsg::Send { to_address, amount } => {
                if amount.is_empty() {
                    return Err(WasmError::InvalidCoins("empty send amount".into()));
                }
                let to = parse_addr(to_address)?;
                let events = self.bank.transfer_coins(ctx, contract, &to, amount)?;
                Ok(DispatchOutput {
                    events,
                    data: Vec::new(),
                })
            }
        }
    }

    fn dispatch_wasm(
        ctx: &mut Context<'_>,
        host: &dyn ContractHost,
        contract: &Address,
        msg: &WasmMsg,
    ) -> WasmResult<DispatchOutput> {
        let data = match msg {
            WasmMsg::Execute {
                contract_addr,
                msg,
                funds,
            } => {
                let target = parse_addr(contract_addr)?;
                let data = host.execute(ctx, &target, contract, msg.as_slice(), funds)?;
                vec![encode(&ExecuteResponse { data })?]
            }
            WasmMsg::Instantiate {
                admin,
                code_id,
                msg,
                funds,
                label,
            } => {
                let admin = match admin.as_deref() {
                    Some(text) if !text.is_empty() => Some(parse_addr(text)?),
                    _ => None,
                };
                let (address, data) =
                    host.instantiate(ctx, *code_id, contract, admin.as_ref(), msg.as_slice(), label, funds)?;
                vec![encode(&InstantiateResponse {
                    address: address.to_string(),
                    data,
                })?]
            }
            WasmMsg::Migrate {
                contract_addr,
                new_code_id,
                msg,
            } => {
                let target = parse_addr(contract_addr)?;
                let data = host.migrate(ctx, &target, contract, *new_code_id, msg.as_slice())?;
                vec![encode(&ExecuteResponse { data })?]
            }
            WasmMsg::UpdateAdmin {
                contract_addr,
                admin,
            } => {
                let target = parse_addr(contract_addr)?;
                let new_admin = parse_addr(admin)?;
                host.update_admin(ctx, &target, contract, Some(&new_admin))?;
                Vec::new()
            }
            WasmMsg::ClearAdmin { contract_addr } => {
                let target = parse_addr(contract_addr)?;
                host.update_admin(ctx, &target, contract, None)?;
                Vec::new()
            }
        };
        Ok(DispatchOutput {
            events: Vec::new(),
            data,
        })
    }
}

impl Messenger for DefaultMessenger {
    fn dispatch_msg(
        &self,
        ctx: &mut Context<'_>,
        host: &dyn ContractHost,
        contract: &Address,
        _ibc_port: Option<&str>,
        msg: &CosmosMsg,
    ) -> WasmResult<DispatchOutput> {
        debug!(%contract, ?msg, "dispatching contract message");
        match msg {
            CosmosMsg::Bank(bank) => self.dispatch_bank(ctx, contract, bank),
            CosmosMsg::Wasm(wasm) => Self::dispatch_wasm(ctx, host, contract, wasm),
            CosmosMsg::Custom(value) => match &self.custom {
                Some(handler) => handler(ctx, contract, value),
                None => Err(WasmError::UnknownMsg("custom variant not supported".into())),
            },
        }
    }
}

// =============================================================================
// CHAIN
// =============================================================================

/// Tries messengers in order, skipping those that answer `UnknownMsg`.
#[derive(Clone, Default)]
pub struct MessageHandlerChain {
    handlers: Vec<Arc<dyn Messenger>>,
}

impl fmt::Debug for MessageHandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandlerChain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl MessageHandlerChain {
    /// Chain over `handlers`, first one tried first.
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn Messenger>>) -> Self {
        Self { handlers }
    }

    /// Appends a handler.
    #[must_use]
    pub fn then(mut self, handler: Arc<dyn Messenger>) -> Self {
        self.handlers.push(handler);
        self
    }
}

impl Messenger for MessageHandlerChain {
    fn dispatch_msg(
        &self,
        ctx: &mut Context<'_>,
        host: &dyn ContractHost,
        contract: &Address,
        ibc_port: Option<&str>,
        msg: &CosmosMsg,
    ) -> WasmResult<DispatchOutput> {
        for handler in &self.handlers {
            match handler.dispatch_msg(ctx, host, contract, ibc_port, msg) {
                Err(e) if matches!(e.root(), WasmError::UnknownMsg(_)) => continue,
                other => return other,
            }
        }
        Err(WasmError::UnknownMsg("no message handler found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bank::StoreBank;
    use crate::context::EventManager;
    use crate::domain::entities::BlockInfo;
    use crate::domain::gas_meter::GasMeter;
    use crate::domain::messages::Reply;
    use crate::domain::value_objects::{Coin, CodeId};
    use crate::ports::inbound::Replyer;
    use crate::ports::outbound::BankView;
    use crate::store::{MemStore, StateArena};
    use std::sync::Mutex;

    /// Records the calls it receives.
    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<String>>,
    }

    impl Replyer for RecordingHost {
        fn reply(&self, _ctx: &mut Context<'_>, _contract: &Address, _reply: &Reply) -> WasmResult<Option<Binary>> {
            Ok(None)
        }
    }

    impl ContractHost for RecordingHost {
        fn instantiate(
            &self,
            _ctx: &mut Context<'_>,
            code_id: CodeId,
            _creator: &Address,
            admin: Option<&Address>,
            _msg: &[u8],
            label: &str,
            _funds: &[Coin],
        ) -> WasmResult<(Address, Option<Binary>)> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("instantiate {code_id} {label} {}", admin.is_some()));
            Ok((Address::new(vec![9; 32]), Some(Binary::from(b"init".to_vec()))))
        }

        fn execute(
            &self,
            _ctx: &mut Context<'_>,
            contract: &Address,
            _caller: &Address,
            msg: &[u8],
            _funds: &[Coin],
        ) -> WasmResult<Option<Binary>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("execute {contract} {}", String::from_utf8_lossy(msg)));
            Ok(None)
        }

        fn migrate(
            &self,
            _ctx: &mut Context<'_>,
            _contract: &Address,
            _caller: &Address,
            new_code_id: CodeId,
            _msg: &[u8],
        ) -> WasmResult<Option<Binary>> {
            self.calls.lock().unwrap().push(format!("migrate {new_code_id}"));
            Ok(None)
        }

        fn update_admin(
            &self,
            _ctx: &mut Context<'_>,
            _contract: &Address,
            _caller: &Address,
            new_admin: Option<&Address>,
        ) -> WasmResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("admin {}", new_admin.is_some()));
            Ok(())
        }
    }

    impl RecordingHost {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 20])
    }

    #[test]
    fn test_bank_send_moves_coins() {
        let mut arena = StateArena::new(Box::new(MemStore::new()));
        let mut meter = GasMeter::infinite();
        let mut events = EventManager::new();
        let block = BlockInfo::default();
        let mut ctx = Context::new(&mut arena, &mut meter, &mut events, &block);
        StoreBank.mint(&mut ctx, &addr(1), &[Coin::new(10, "ustake")]).unwrap();

        let messenger = DefaultMessenger::new(Arc::new(StoreBank));
        let msg = CosmosMsg::Bank(BankMsg::Send {
            to_address: addr(2).to_string(),
            amount: vec![Coin::new(4, "ustake")],
        });
        let out = messenger
            .dispatch_msg(&mut ctx, &RecordingHost::default(), &addr(1), None, &msg)
            .unwrap();

        assert!(out.data.is_empty());
        assert_eq!(out.events[0].ty, "transfer");
        assert_eq!(StoreBank.balance(&ctx, &addr(2), "ustake").unwrap().amount, 4);
    }

    #[test]
    fn test_bank_send_rejects_empty_amount() {
        let mut arena = StateArena::new(Box::new(MemStore::new()));
        let mut meter = GasMeter::infinite();
        let mut events = EventManager::new();
        let block = BlockInfo::default();
        let mut ctx = Context::new(&mut arena, &mut meter, &mut events, &block);
        let messenger = DefaultMessenger::new(Arc::new(StoreBank));
        let msg = CosmosMsg::Bank(BankMsg::Send {
            to_address: addr(2).to_string(),
            amount: vec![],
        });
        let err = messenger
            .dispatch_msg(&mut ctx, &RecordingHost::default(), &addr(1), None, &msg)
            .unwrap_err();
        assert!(matches!(err, WasmError::InvalidCoins(_)));
    }

    #[test]
    fn test_wasm_messages_reach_host() {
        let mut arena = StateArena::new(Box::new(MemStore::new()));
        let mut meter = GasMeter::infinite();
        let mut events = EventManager::new();
        let block = BlockInfo::default();
        let mut ctx = Context::new(&mut arena, &mut meter, &mut events, &block);
        let messenger = DefaultMessenger::new(Arc::new(StoreBank));
        let host = RecordingHost::default();
        let target = addr(7).to_string();

        let out = messenger
            .dispatch_msg(
                &mut ctx,
                &host,
                &addr(1),
                None,
                &CosmosMsg::Wasm(WasmMsg::Instantiate {
                    admin: Some(String::new()),
                    code_id: 3,
                    msg: Binary::from(b"{}".to_vec()),
                    funds: vec![],
                    label: "demo".into(),
                }),
            )
            .unwrap();
        let resp: InstantiateResponse = serde_json::from_slice(out.data[0].as_slice()).unwrap();
        assert_eq!(resp.address, Address::new(vec![9; 32]).to_string());
        assert_eq!(resp.data, Some(Binary::from(b"init".to_vec())));

        messenger
            .dispatch_msg(
                &mut ctx,
                &host,
                &addr(1),
                None,
                &CosmosMsg::Wasm(WasmMsg::Execute {
                    contract_addr: target.clone(),
                    msg: Binary::from(b"go".to_vec()),
                    funds: vec![],
                }),
            )
            .unwrap();
        messenger
            .dispatch_msg(
                &mut ctx,
                &host,
                &addr(1),
                None,
                &CosmosMsg::Wasm(WasmMsg::ClearAdmin { contract_addr: target }),
            )
            .unwrap();

        assert_eq!(
            host.calls(),
            vec![
                "instantiate 3 demo false".to_string(),
                format!("execute {} go", addr(7)),
                "admin false".to_string(),
            ]
        );
    }

    #[test]
    fn test_custom_without_handler_is_unknown() {
        let mut arena = StateArena::new(Box::new(MemStore::new()));
        let mut meter = GasMeter::infinite();
        let mut events = EventManager::new();
        let block = BlockInfo::default();
        let mut ctx = Context::new(&mut arena, &mut meter, &mut events, &block);
        let messenger = DefaultMessenger::new(Arc::new(StoreBank));
        let err = messenger
            .dispatch_msg(
                &mut ctx,
                &RecordingHost::default(),
                &addr(1),
                None,
                &CosmosMsg::Custom(serde_json::json!({"mint": {}})),
            )
            .unwrap_err();
        assert!(matches!(err, WasmError::UnknownMsg(_)));
    }

    #[test]
    fn test_chain_skips_unknown() {
        let mut arena = StateArena::new(Box::new(MemStore::new()));
        let mut meter = GasMeter::infinite();
        let mut events = EventManager::new();
        let block = BlockInfo::default();
        let mut ctx = Context::new(&mut arena, &mut meter, &mut events, &block);

        let custom: CustomMsgHandler = Arc::new(|_ctx: &mut Context<'_>, _contract: &Address, _msg: &serde_json::Value| {
            Ok(DispatchOutput {
                events: vec![],
                data: vec![Binary::from(b"custom".to_vec())],
            })
        });
        let chain = MessageHandlerChain::new(vec![Arc::new(DefaultMessenger::new(Arc::new(StoreBank)))])
            .then(Arc::new(DefaultMessenger::new(Arc::new(StoreBank)).with_custom_handler(custom)));

        let out = chain
            .dispatch_msg(
                &mut ctx,
                &RecordingHost::default(),
                &addr(1),
                None,
                &CosmosMsg::Custom(serde_json::json!({})),
            )
            .unwrap();
        assert_eq!(out.data, vec![Binary::from(b"custom".to_vec())]);

        let empty = MessageHandlerChain::default();
        assert!(matches!(
            empty.dispatch_msg(
                &mut ctx,
                &RecordingHost::default(),
                &addr(1),
                None,
                &CosmosMsg::Custom(serde_json::json!({})),
            ),
            Err(WasmError::UnknownMsg(_))
        ));
    }
}
