//! # Gas Meter
//!
//! Ledger gas accounting for one transaction or query.

use crate::domain::gas::Gas;
use crate::errors::{WasmError, WasmResult};

/// Tracks ledger gas against an optional limit.
///
/// Consuming past the limit records the consumption and then fails with the
/// fatal [`WasmError::OutOfGas`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GasMeter {
    limit: Option<Gas>,
    consumed: Gas,
}

impl GasMeter {
    /// Meter that fails once `limit` is exceeded.
    #[must_use]
    pub fn new(limit: Gas) -> Self {
        Self {
            limit: Some(limit),
            consumed: 0,
        }
    }

    /// Meter without a limit.
    #[must_use]
    pub fn infinite() -> Self {
        Self {
            limit: None,
            consumed: 0,
        }
    }

    /// The limit, `None` for infinite meters.
    #[must_use]
    pub fn limit(&self) -> Option<Gas> {
        self.limit
    }

    /// Returns true if the meter has no limit.
    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.limit.is_none()
    }

    /// Gas consumed so far.
    #[must_use]
    pub fn consumed(&self) -> Gas {
        self.consumed
    }

    /// Gas left before the limit; `u64::MAX` for infinite meters.
    #[must_use]
    pub fn remaining(&self) -> Gas {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.consumed),
            None => u64::MAX,
        }
    }

    /// Consumed gas capped at the limit.
    #[must_use]
    pub fn consumed_to_limit(&self) -> Gas {
        match self.limit {
            Some(limit) => self.consumed.min(limit),
            None => self.consumed,
        }
    }

    /// Returns true once nothing is left.
    #[must_use]
    pub fn is_out_of_gas(&self) -> bool {
        matches!(self.limit, Some(limit) if self.consumed >= limit)
    }

    /// Returns true once the limit has been passed.
    #[must_use]
    pub fn is_past_limit(&self) -> bool {
        matches!(self.limit, Some(limit) if self.consumed > limit)
    }

    /// Charges `amount`.
    pub fn consume(&mut self, amount: Gas, descriptor: &str) -> WasmResult<()> {
        self.consumed = self
            .consumed
            .checked_add(amount)
            .ok_or_else(|| WasmError::GasOverflow {
                descriptor: descriptor.into(),
            })?;
        if self.is_past_limit() {
            return Err(WasmError::OutOfGas {
                descriptor: descriptor.into(),
            });
        }
        Ok(())
    }

    /// Gives back `amount`. Never goes below zero.
    pub fn refund(&mut self, amount: Gas) {
        self.consumed = self.consumed.saturating_sub(amount);
    }
}

impl Default for GasMeter {
    fn default() -> Self {
        Self::infinite()
    }
}
