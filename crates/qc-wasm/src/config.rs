//! Runtime configuration from defaults and environment variables.

use crate::domain::gas::GasRegisterConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Default upper bound for uploaded code after decompression.
pub const DEFAULT_MAX_WASM_SIZE: usize = 800 * 1024;

/// Default nesting limit for contract-to-contract smart queries.
pub const DEFAULT_MAX_QUERY_STACK_SIZE: u32 = 10;

/// Default ledger gas granted to a top-level smart query.
pub const DEFAULT_SMART_QUERY_GAS_LIMIT: u64 = 3_000_000;

/// Invalid configuration value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable did not parse.
    #[error("invalid value for {var}: {value}")]
    InvalidVar {
        /// Variable name.
        var: String,
        /// Raw value.
        value: String,
    },

    /// A value is out of its allowed range.
    #[error("invalid config: {0}")]
    OutOfRange(String),
}

/// Configuration of the contract runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasmConfig {
    /// Upper bound for code size after gunzip.
    pub max_wasm_size: usize,
    /// Maximum nesting of smart queries.
    pub max_query_stack_size: u32,
    /// Ledger gas for a top-level smart query.
    pub smart_query_gas_limit: u64,
    /// Log contract errors in full before redaction.
    pub contract_debug_mode: bool,
    /// Cost model parameters.
    pub gas_register: GasRegisterConfig,
}

impl Default for WasmConfig {
    fn default() -> Self {
        Self {
            max_wasm_size: DEFAULT_MAX_WASM_SIZE,
            max_query_stack_size: DEFAULT_MAX_QUERY_STACK_SIZE,
            smart_query_gas_limit: DEFAULT_SMART_QUERY_GAS_LIMIT,
            contract_debug_mode: false,
            gas_register: GasRegisterConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar {
                var: var.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

impl WasmConfig {
    /// Defaults overridden by environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_WASM_MAX_WASM_SIZE`: code size limit in bytes (default: 819200)
    /// - `QC_WASM_MAX_QUERY_STACK_SIZE`: smart query nesting limit (default: 10)
    /// - `QC_WASM_SMART_QUERY_GAS_LIMIT`: gas per top-level query (default: 3000000)
    /// - `QC_WASM_GAS_MULTIPLIER`: VM gas per ledger gas (default: 140000000)
    /// - `QC_WASM_DEBUG`: log unredacted contract errors (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = parse_var("QC_WASM_MAX_WASM_SIZE")? {
            config.max_wasm_size = v;
        }
        if let Some(v) = parse_var("QC_WASM_MAX_QUERY_STACK_SIZE")? {
            config.max_query_stack_size = v;
        }
        if let Some(v) = parse_var("QC_WASM_SMART_QUERY_GAS_LIMIT")? {
            config.smart_query_gas_limit = v;
        }
        if let Some(v) = parse_var("QC_WASM_GAS_MULTIPLIER")? {
            config.gas_register.gas_multiplier = v;
        }
        config.contract_debug_mode = env::var("QC_WASM_DEBUG")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_wasm_size == 0 {
            return Err(ConfigError::OutOfRange("max_wasm_size must be positive".into()));
        }
        if self.max_query_stack_size == 0 {
            return Err(ConfigError::OutOfRange(
                "max_query_stack_size must be positive".into(),
            ));
        }
        if self.gas_register.gas_multiplier == 0 {
            return Err(ConfigError::OutOfRange("gas_multiplier must not be zero".into()));
        }
        Ok(())
    }
}
