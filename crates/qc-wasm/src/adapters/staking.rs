//! # Static Staking View
//!
//! A fixed validator set, for hosts without a staking module and for tests.

use crate::domain::messages::Validator;
use crate::ports::outbound::StakingView;

/// Default staking denom.
pub const DEFAULT_BONDED_DENOM: &str = "ustake";

/// Validator set fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticStaking {
    bonded_denom: String,
    validators: Vec<Validator>,
}

impl StaticStaking {
    /// Creates the view.
    #[must_use]
    pub fn new(bonded_denom: impl Into<String>, validators: Vec<Validator>) -> Self {
        Self {
            bonded_denom: bonded_denom.into(),
            validators,
        }
    }
}

impl Default for StaticStaking {
    fn default() -> Self {
        Self::new(DEFAULT_BONDED_DENOM, Vec::new())
    }
}

impl StakingView for StaticStaking {
    fn bonded_denom(&self) -> String {
        self.bonded_denom.clone()
    }

    fn all_validators(&self) -> Vec<Validator> {
        self.validators.clone()
    }

    fn validator(&self, address: &str) -> Option<Validator> {
        self.validators.iter().find(|v| v.address == address).cloned()
    }
}
