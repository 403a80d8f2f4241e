//! # Gas Register
//!
//! Cost model of the runtime. Converts between ledger gas and VM gas and
//! prices the setup work a contract call causes (code compilation, instance
//! loading, event emission).
//!
//! Every function is pure. Arithmetic is checked; an overflow is reported as
//! the fatal [`WasmError::GasOverflow`] instead of wrapping.

use crate::domain::messages::{Attribute, Event, Reply, SubMsgResult};
use crate::errors::{WasmError, WasmResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger gas unit.
pub type Gas = u64;

// =============================================================================
// DEFAULT COSTS
// =============================================================================

/// Default cost parameters.
pub mod costs {
    /// VM gas per ledger gas unit.
    pub const GAS_MULTIPLIER: u64 = 140_000_000;
    /// Flat cost to load a non-pinned instance.
    pub const INSTANCE_COST: u64 = 60_000;
    /// Cost per byte of compiled code.
    pub const COMPILE_COST: u64 = 3;
    /// Cost per byte of event attribute data above the free tier.
    pub const EVENT_ATTRIBUTE_DATA_COST: u64 = 1;
    /// Cost per byte of contract message data.
    pub const CONTRACT_MESSAGE_DATA_COST: u64 = 0;
    /// Flat cost per emitted attribute.
    pub const PER_ATTRIBUTE_COST: u64 = 10;
    /// Flat cost per custom event.
    pub const PER_CUSTOM_EVENT_COST: u64 = 20;
    /// Attribute bytes per call that are free of charge.
    pub const EVENT_ATTRIBUTE_DATA_FREE_TIER: u64 = 100;
}

// =============================================================================
// CONFIG
// =============================================================================

/// Numeric knobs of the cost model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasRegisterConfig {
    /// Flat instance load cost, waived for pinned code.
    pub instance_cost: Gas,
    /// Per byte of uncompressed code.
    pub compile_cost: Gas,
    /// VM gas per ledger gas. Never zero.
    pub gas_multiplier: u64,
    /// Flat cost per attribute.
    pub event_per_attribute_cost: Gas,
    /// Per byte of attribute data above the free tier.
    pub event_attribute_data_cost: Gas,
    /// Attribute bytes per call that are free.
    pub event_attribute_data_free_tier: u64,
    /// Per byte of contract message data.
    pub contract_message_data_cost: Gas,
    /// Flat cost per custom event.
    pub custom_event_cost: Gas,
}

impl Default for GasRegisterConfig {
    fn default() -> Self {
        Self {
            instance_cost: costs::INSTANCE_COST,
            compile_cost: costs::COMPILE_COST,
            gas_multiplier: costs::GAS_MULTIPLIER,
            event_per_attribute_cost: costs::PER_ATTRIBUTE_COST,
            event_attribute_data_cost: costs::EVENT_ATTRIBUTE_DATA_COST,
            event_attribute_data_free_tier: costs::EVENT_ATTRIBUTE_DATA_FREE_TIER,
            contract_message_data_cost: costs::CONTRACT_MESSAGE_DATA_COST,
            custom_event_cost: costs::PER_CUSTOM_EVENT_COST,
        }
    }
}

impl GasRegisterConfig {
    /// Rejects configurations the register cannot work with.
    pub fn validate(&self) -> WasmResult<()> {
        if self.gas_multiplier == 0 {
            return Err(WasmError::Invalid("gas multiplier can not be 0".into()));
        }
        Ok(())
    }
}

// =============================================================================
// REGISTER
// =============================================================================

/// Cost model used by the keeper.
pub trait GasRegister: Send + Sync + fmt::Debug {
    /// Cost to compile `byte_length` bytes of code.
    fn compile_cost(&self, byte_length: usize) -> WasmResult<Gas>;

    /// Cost to load an instance and pass it a message of `msg_len` bytes.
    fn instantiate_cost(&self, pinned: bool, msg_len: usize) -> WasmResult<Gas>;

    /// Cost to call the reply entry point with `reply`.
    fn reply_cost(&self, pinned: bool, reply: &Reply) -> WasmResult<Gas>;

    /// Cost of the attributes and custom events of a contract response.
    fn event_costs(&self, attributes: &[Attribute], events: &[Event]) -> WasmResult<Gas>;

    /// Ledger gas to VM gas.
    fn to_vm_gas(&self, ledger_gas: Gas) -> WasmResult<u64>;

    /// VM gas to ledger gas, rounding down.
    fn from_vm_gas(&self, vm_gas: u64) -> Gas;
}

/// Default [`GasRegister`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WasmGasRegister {
    config: GasRegisterConfig,
}

impl WasmGasRegister {
    /// Creates a register. Fails if the multiplier is zero.
    pub fn new(config: GasRegisterConfig) -> WasmResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &GasRegisterConfig {
        &self.config
    }

    /// Cost of `attrs` given `free_tier` remaining free bytes.
    ///
    /// Returns the cost and the free bytes left for the next call.
    pub fn event_attribute_costs(
        &self,
        attrs: &[Attribute],
        free_tier: u64,
    ) -> WasmResult<(Gas, u64)> {
        if attrs.is_empty() {
            return Ok((0, free_tier));
        }
        let mut stored_bytes: u64 = 0;
        for attr in attrs {
            stored_bytes = checked_add(stored_bytes, len_u64(attr.key.len())?, "event attributes")?;
            stored_bytes = checked_add(stored_bytes, len_u64(attr.value.len())?, "event attributes")?;
        }
        let (charged_bytes, remaining) = calc_with_free_tier(stored_bytes, free_tier);
        let data_cost = checked_mul(
            self.config.event_attribute_data_cost,
            charged_bytes,
            "event attributes",
        )?;
        let count_cost = checked_mul(
            self.config.event_per_attribute_cost,
            len_u64(attrs.len())?,
            "event attributes",
        )?;
        Ok((checked_add(data_cost, count_cost, "event attributes")?, remaining))
    }

    fn type_name_cost(&self, ty: &str) -> WasmResult<Gas> {
        checked_mul(
            len_u64(ty.len())?,
            self.config.event_attribute_data_cost,
            "event type",
        )
    }
}

impl Default for WasmGasRegister {
    fn default() -> Self {
        Self {
            config: GasRegisterConfig::default(),
        }
    }
}

impl GasRegister for WasmGasRegister {
    fn compile_cost(&self, byte_length: usize) -> WasmResult<Gas> {
        checked_mul(self.config.compile_cost, len_u64(byte_length)?, "compile")
    }

    fn instantiate_cost(&self, pinned: bool, msg_len: usize) -> WasmResult<Gas> {
        let data_cost = checked_mul(
            self.config.contract_message_data_cost,
            len_u64(msg_len)?,
            "contract message",
        )?;
        if pinned {
            return Ok(data_cost);
        }
        checked_add(self.config.instance_cost, data_cost, "contract instance")
    }

    fn reply_cost(&self, pinned: bool, reply: &Reply) -> WasmResult<Gas> {
        let mut event_gas: Gas = 0;
        let msg_len = match &reply.result {
            SubMsgResult::Err(text) => text.len(),
            SubMsgResult::Ok(response) => {
                let mut attrs = Vec::new();
                for event in &response.events {
                    event_gas = checked_add(event_gas, self.type_name_cost(&event.ty)?, "reply")?;
                    attrs.extend(event.attributes.iter().cloned());
                }
                // free tier applies to the whole set, not per event
                event_gas = checked_add(event_gas, self.event_costs(&attrs, &[])?, "reply")?;
                response.data.as_ref().map_or(0, |d| d.len())
            }
        };
        checked_add(event_gas, self.instantiate_cost(pinned, msg_len)?, "reply")
    }

    fn event_costs(&self, attributes: &[Attribute], events: &[Event]) -> WasmResult<Gas> {
        let (mut gas, mut remaining) =
            self.event_attribute_costs(attributes, self.config.event_attribute_data_free_tier)?;
        for event in events {
            gas = checked_add(gas, self.config.custom_event_cost, "custom event")?;
            gas = checked_add(gas, self.type_name_cost(&event.ty)?, "custom event")?;
            let (attr_cost, left) = self.event_attribute_costs(&event.attributes, remaining)?;
            remaining = left;
            gas = checked_add(gas, attr_cost, "custom event")?;
        }
        Ok(gas)
    }

    fn to_vm_gas(&self, ledger_gas: Gas) -> WasmResult<u64> {
        checked_mul(ledger_gas, self.config.gas_multiplier, "to vm gas")
    }

    fn from_vm_gas(&self, vm_gas: u64) -> Gas {
        vm_gas / self.config.gas_multiplier
    }
}

/// Splits `stored_bytes` into charged bytes and the free tier left over.
#[must_use]
pub fn calc_with_free_tier(stored_bytes: u64, free_tier: u64) -> (u64, u64) {
    if stored_bytes <= free_tier {
        (0, free_tier - stored_bytes)
    } else {
        (stored_bytes - free_tier, 0)
    }
}

fn len_u64(len: usize) -> WasmResult<u64> {
    u64::try_from(len).map_err(|_| WasmError::GasOverflow {
        descriptor: "length".into(),
    })
}

fn checked_mul(a: u64, b: u64, descriptor: &str) -> WasmResult<u64> {
    a.checked_mul(b).ok_or_else(|| WasmError::GasOverflow {
        descriptor: descriptor.into(),
    })
}

fn checked_add(a: u64, b: u64, descriptor: &str) -> WasmResult<u64> {
    a.checked_add(b).ok_or_else(|| WasmError::GasOverflow {
        descriptor: descriptor.into(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
