//! # Store Bank
//!
//! Accounts and balances kept in the transactional store, so that coin
//! movements roll back together with the contract state that caused them.

use crate::context::Context;
use crate::domain::value_objects::{coins_to_string, validate_coins, Address, Coin};
use crate::domain::messages::Event;
use crate::errors::{WasmError, WasmResult};
use crate::events::{
    ATTRIBUTE_KEY_AMOUNT, ATTRIBUTE_KEY_RECIPIENT, ATTRIBUTE_KEY_SENDER, EVENT_TYPE_MESSAGE,
    EVENT_TYPE_TRANSFER,
};
use crate::ports::outbound::{AccountKeeper, BankView, CoinTransferrer, PortKeeper};
use crate::store::keys::{account_key, balance_key, balance_prefix, port_key};
use crate::store::Order;
use tracing::debug;

const ACCOUNT_MARKER: &[u8] = &[1];

/// Bank and account registry over the store.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreBank;

impl StoreBank {
    /// Creates the bank.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Credits `coins` to `addr` out of thin air. Genesis and tests only.
    pub fn mint(&self, ctx: &mut Context<'_>, addr: &Address, coins: &[Coin]) -> WasmResult<()> {
        validate_coins(coins)?;
        ensure_account(ctx, addr)?;
        for coin in coins {
            let current = read_amount(ctx, addr, &coin.denom)?;
            let next = current
                .checked_add(coin.amount)
                .ok_or_else(|| WasmError::InvalidCoins(format!("balance overflow: {coin}")))?;
            write_amount(ctx, addr, &coin.denom, next)?;
        }
        Ok(())
    }
}

fn ensure_account(ctx: &mut Context<'_>, addr: &Address) -> WasmResult<()> {
    let key = account_key(addr);
    if !ctx.has(&key)? {
        ctx.set(&key, ACCOUNT_MARKER)?;
    }
    Ok(())
}

fn read_amount(ctx: &Context<'_>, addr: &Address, denom: &str) -> WasmResult<u128> {
    match ctx.get(&balance_key(addr, denom))? {
        Some(bytes) => {
            let raw = <[u8; 16]>::try_from(bytes.as_slice())
                .map_err(|_| WasmError::Invalid(format!("corrupt balance for {denom}")))?;
            Ok(u128::from_be_bytes(raw))
        }
        None => Ok(0),
    }
}

fn write_amount(ctx: &mut Context<'_>, addr: &Address, denom: &str, amount: u128) -> WasmResult<()> {
    let key = balance_key(addr, denom);
    if amount == 0 {
        ctx.delete(&key)
    } else {
        ctx.set(&key, &amount.to_be_bytes())
    }
}

impl AccountKeeper for StoreBank {
    fn has_account(&self, ctx: &Context<'_>, addr: &Address) -> WasmResult<bool> {
        ctx.has(&account_key(addr))
    }

    fn new_account(&self, ctx: &mut Context<'_>, addr: &Address) -> WasmResult<()> {
        ensure_account(ctx, addr)
    }
}

impl CoinTransferrer for StoreBank {
    fn transfer_coins(
        &self,
        ctx: &mut Context<'_>,
        from: &Address,
        to: &Address,
        amount: &[Coin],
    ) -> WasmResult<Vec<Event>> {
        validate_coins(amount)?;
        for coin in amount {
            let balance = read_amount(ctx, from, &coin.denom)?;
            let left = balance.checked_sub(coin.amount).ok_or_else(|| {
                WasmError::InsufficientFunds(format!(
                    "{balance}{} is smaller than {coin}",
                    coin.denom
                ))
            })?;
            write_amount(ctx, from, &coin.denom, left)?;
            let received = read_amount(ctx, to, &coin.denom)?
                .checked_add(coin.amount)
                .ok_or_else(|| WasmError::InvalidCoins(format!("balance overflow: {coin}")))?;
            write_amount(ctx, to, &coin.denom, received)?;
        }
        ensure_account(ctx, to)?;
        let amount_text = coins_to_string(amount);
        debug!(%from, %to, amount = %amount_text, "transferred coins");
        Ok(vec![
            Event::new(EVENT_TYPE_TRANSFER)
                .add_attribute(ATTRIBUTE_KEY_RECIPIENT, to.to_string())
                .add_attribute(ATTRIBUTE_KEY_SENDER, from.to_string())
                .add_attribute(ATTRIBUTE_KEY_AMOUNT, amount_text),
            Event::new(EVENT_TYPE_MESSAGE).add_attribute(ATTRIBUTE_KEY_SENDER, from.to_string()),
        ])
    }
}

impl BankView for StoreBank {
    fn balance(&self, ctx: &Context<'_>, addr: &Address, denom: &str) -> WasmResult<Coin> {
        Ok(Coin::new(read_amount(ctx, addr, denom)?, denom))
    }

    fn all_balances(&self, ctx: &Context<'_>, addr: &Address) -> WasmResult<Vec<Coin>> {
        let prefix = balance_prefix(addr);
        ctx.prefix_range(&prefix, Order::Ascending)?
            .into_iter()
            .map(|(key, value)| {
                let denom = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
                let raw = <[u8; 16]>::try_from(value.as_slice())
                    .map_err(|_| WasmError::Invalid(format!("corrupt balance for {denom}")))?;
                Ok(Coin::new(u128::from_be_bytes(raw), denom))
            })
            .collect()
    }
}

// =============================================================================
// PORTS
// =============================================================================

/// IBC port bindings over the store.
#[derive(Clone, Copy, Debug, Default)]
pub struct StorePortKeeper;

impl StorePortKeeper {
    /// Creates the port keeper.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Owner of `port_id`, if bound.
    pub fn owner(&self, ctx: &Context<'_>, port_id: &str) -> WasmResult<Option<Address>> {
        Ok(ctx.get(&port_key(port_id))?.map(Address::new))
    }
}

impl PortKeeper for StorePortKeeper {
    fn is_bound(&self, ctx: &Context<'_>, port_id: &str) -> WasmResult<bool> {
        ctx.has(&port_key(port_id))
    }

    fn bind_port(&self, ctx: &mut Context<'_>, port_id: &str, owner: &Address) -> WasmResult<()> {
        if self.is_bound(ctx, port_id)? {
            return Err(WasmError::Duplicate(format!("port {port_id} already bound")));
        }
        ctx.set(&port_key(port_id), owner.as_bytes())
    }
}
