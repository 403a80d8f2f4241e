//! # Error Types
//!
//! All error types for contract execution.
//!
//! Every [`WasmError`] maps onto a stable `(codespace, code)` pair. Those pairs
//! are what a replying contract gets to see after redaction: free text is
//! allowed to change between binary versions, the pair is not.

use thiserror::Error;

/// Codespace of the ledger base errors.
pub const SDK_CODESPACE: &str = "sdk";

/// Codespace of the contract runtime errors.
pub const WASM_CODESPACE: &str = "wasm";

// =============================================================================
// SYSTEM ERRORS
// =============================================================================

/// Errors the engine treats as host failures rather than contract failures.
///
/// These pass redaction verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// The query request could not be parsed.
    #[error("Cannot parse request: {error} in: {request}")]
    InvalidRequest {
        /// Parser message.
        error: String,
        /// The offending request, lossily decoded.
        request: String,
    },

    /// The query response could not be parsed.
    #[error("Cannot parse response: {error} in: {response}")]
    InvalidResponse {
        /// Parser message.
        error: String,
        /// The offending response, lossily decoded.
        response: String,
    },

    /// Queried contract does not exist.
    #[error("No such contract: {addr}")]
    NoSuchContract {
        /// Address as given by the caller.
        addr: String,
    },

    /// Unclassified host failure.
    #[error("Unknown system error")]
    Unknown,

    /// No handler is registered for this request kind.
    #[error("Unsupported query type: {kind}")]
    UnsupportedRequest {
        /// Request kind.
        kind: String,
    },
}

// =============================================================================
// ENGINE ERRORS
// =============================================================================

/// Errors reported by the contract engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// The contract returned an error result.
    #[error("{0}")]
    Contract(String),

    /// The engine exhausted the gas limit it was given.
    #[error("Ran out of gas during contract execution")]
    GasDepletion,

    /// Bytecode failed validation or compilation.
    #[error("Error compiling Wasm: {0}")]
    Compile(String),

    /// Checksum unknown to the engine cache.
    #[error("Error opening Wasm file for reading: {0}")]
    CodeNotFound(String),

    /// The contract does not export the requested entry point.
    #[error("Missing export: {0}")]
    MissingEntryPoint(String),

    /// A host callback (storage, querier) failed.
    #[error("Backend error: {0}")]
    Backend(String),
}

// =============================================================================
// STORE ERRORS
// =============================================================================

/// Errors from the state arena and its base store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Write attempted against a read-only base store.
    #[error("store is read-only")]
    ReadOnly,

    /// The scope id is not live in the arena.
    #[error("unknown scope: {0}")]
    UnknownScope(usize),

    /// The scope still has live child scopes.
    #[error("scope {0} has open child scopes")]
    OpenChildren(usize),

    /// The root scope can only be flushed, not committed or discarded.
    #[error("root scope cannot be committed or discarded")]
    RootScope,

    /// A persisted record failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

// =============================================================================
// QUERIER ERRORS
// =============================================================================

/// Error handed back to the engine when a contract-triggered query fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuerierError {
    /// Host-level failure, passed verbatim.
    #[error(transparent)]
    System(#[from] SystemError),

    /// Any other failure, reduced to `codespace: <cs>, code: <n>`.
    #[error("{0}")]
    Redacted(String),

    /// A fatal condition was raised; the engine must abort the call.
    #[error("query aborted by host")]
    Aborted,
}

// =============================================================================
// RUNTIME ERRORS
// =============================================================================

/// Errors raised by the keeper, dispatcher and query handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WasmError {
    /// Malformed or empty address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Authorization policy denied the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Request refers to something that cannot be served.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Account balance too low for a transfer.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Coin list is malformed.
    #[error("invalid coins: {0}")]
    InvalidCoins(String),

    /// Gas meter exhausted. Fatal: only the submessage gas-limit boundary and
    /// the top-level query boundary may turn it into an ordinary error.
    #[error("out of gas in location: {descriptor}")]
    OutOfGas {
        /// What was being paid for.
        descriptor: String,
    },

    /// Gas arithmetic overflowed. Fatal like [`WasmError::OutOfGas`].
    #[error("gas overflow in location: {descriptor}")]
    GasOverflow {
        /// What was being computed.
        descriptor: String,
    },

    /// A submessage exceeded its own gas limit (recoverable).
    #[error("SubMsg hit gas limit: {limit}")]
    SubMsgGasLimit {
        /// The limit the parent paid for.
        limit: u64,
    },

    /// Engine rejected the code.
    #[error("create wasm contract failed: {0}")]
    CreateFailed(String),

    /// Contract address already taken by an account.
    #[error("contract account already exists: {0}")]
    AccountExists(String),

    /// Engine instantiate call failed.
    #[error("instantiate wasm contract failed: {0}")]
    InstantiateFailed(String),

    /// Engine execute, sudo or reply call failed.
    #[error("execute wasm contract failed: {0}")]
    ExecuteFailed(String),

    /// Code or contract missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Engine query call failed.
    #[error("query wasm contract failed: {0}")]
    QueryFailed(String),

    /// Message failed validation.
    #[error("invalid CosmosMsg from the contract: {0}")]
    InvalidMsg(String),

    /// Engine migrate call failed or migration is not allowed.
    #[error("migrate wasm contract failed: {0}")]
    MigrationFailed(String),

    /// Required input is empty.
    #[error("empty: {0}")]
    Empty(String),

    /// Input exceeds a configured limit.
    #[error("exceeds limit: {0}")]
    Limit(String),

    /// Generic invariant violation on input.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Record already present.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Engine refused to pin a code.
    #[error("pinning contract failed: {0}")]
    PinContractFailed(String),

    /// Engine refused to unpin a code.
    #[error("unpinning contract failed: {0}")]
    UnpinContractFailed(String),

    /// No messenger handles this message kind.
    #[error("unknown message from the contract: {0}")]
    UnknownMsg(String),

    /// Contract emitted an invalid event or attribute.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Contract info lookup for an address without contract.
    #[error("no such contract: {addr}")]
    NoSuchContract {
        /// Address as given by the caller.
        addr: String,
    },

    /// Nested smart queries went deeper than allowed.
    #[error("max query stack size exceeded: {depth} > {max}")]
    ExceedMaxQueryStackSize {
        /// Depth that was attempted.
        depth: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Host failure passed to contracts verbatim.
    #[error(transparent)]
    System(#[from] SystemError),

    /// State arena failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An error with added context. Keeps the code of the inner error.
    #[error("{context}: {source}")]
    Wrapped {
        /// Context text.
        context: String,
        /// Inner error.
        source: Box<WasmError>,
    },
}

impl WasmError {
    /// Returns true for the stack-unwinding gas conditions.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfGas { .. } | Self::GasOverflow { .. })
    }

    /// Returns true if this is (or wraps) an out-of-gas condition.
    #[must_use]
    pub fn is_out_of_gas(&self) -> bool {
        matches!(self.root(), Self::OutOfGas { .. })
    }

    /// Adds context, keeping the inner code. Fatal errors are returned as-is
    /// so that catch points can still recognize them.
    #[must_use]
    pub fn wrap(self, context: impl Into<String>) -> Self {
        if self.is_fatal() {
            return self;
        }
        Self::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error below all [`WasmError::Wrapped`] layers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Wrapped { source, .. } => source.root(),
            other => other,
        }
    }

    /// Codespace of the registered error.
    #[must_use]
    pub fn codespace(&self) -> &'static str {
        match self.root() {
            Self::InvalidAddress(_)
            | Self::Unauthorized(_)
            | Self::InvalidRequest(_)
            | Self::InsufficientFunds(_)
            | Self::InvalidCoins(_)
            | Self::OutOfGas { .. }
            | Self::GasOverflow { .. }
            | Self::SubMsgGasLimit { .. }
            | Self::Store(_) => SDK_CODESPACE,
            _ => WASM_CODESPACE,
        }
    }

    /// Registered code within [`Self::codespace`].
    #[must_use]
    pub fn code(&self) -> u32 {
        match self.root() {
            Self::Store(_) => 1,
            Self::Unauthorized(_) => 4,
            Self::InsufficientFunds(_) => 5,
            Self::InvalidAddress(_) => 7,
            Self::InvalidCoins(_) => 10,
            Self::OutOfGas { .. } | Self::GasOverflow { .. } | Self::SubMsgGasLimit { .. } => 11,
            Self::InvalidRequest(_) => 18,
            Self::CreateFailed(_) => 2,
            Self::AccountExists(_) => 3,
            Self::InstantiateFailed(_) => 4,
            Self::ExecuteFailed(_) => 5,
            Self::NotFound(_) => 8,
            Self::QueryFailed(_) => 9,
            Self::InvalidMsg(_) => 10,
            Self::MigrationFailed(_) => 11,
            Self::Empty(_) => 12,
            Self::Limit(_) => 13,
            Self::Invalid(_) => 14,
            Self::Duplicate(_) => 15,
            Self::PinContractFailed(_) => 18,
            Self::UnpinContractFailed(_) => 19,
            Self::UnknownMsg(_) => 20,
            Self::InvalidEvent(_) => 21,
            Self::NoSuchContract { .. } => 22,
            Self::ExceedMaxQueryStackSize { .. } => 27,
            Self::System(_) => 28,
            Self::Wrapped { source, .. } => source.code(),
        }
    }

    /// The system error at the root, if any.
    #[must_use]
    pub fn as_system(&self) -> Option<&SystemError> {
        match self.root() {
            Self::System(sys) => Some(sys),
            _ => None,
        }
    }
}

/// Reduces an error to what a contract may observe.
///
/// System errors pass through verbatim; anything else becomes
/// `codespace: <cs>, code: <n>` with no free text.
#[must_use]
pub fn redact_error(err: &WasmError) -> String {
    if let Some(sys) = err.as_system() {
        return sys.to_string();
    }
    format!("codespace: {}, code: {}", err.codespace(), err.code())
}

/// Result alias used across the crate.
pub type WasmResult<T> = Result<T, WasmError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_keeps_code() {
        let err = WasmError::NotFound("contract".into()).wrap("dispatch");
        assert_eq!(err.codespace(), WASM_CODESPACE);
        assert_eq!(err.code(), 8);
        assert_eq!(err.to_string(), "dispatch: not found: contract");
    }

    #[test]
    fn test_wrap_never_hides_fatal() {
        let err = WasmError::OutOfGas {
            descriptor: "wasm contract".into(),
        }
        .wrap("dispatch");
        assert!(err.is_fatal());
        assert!(matches!(err, WasmError::OutOfGas { .. }));
    }

    #[test]
    fn test_redact_ordinary_error() {
        let err = WasmError::ExecuteFailed("boom at line 42".into()).wrap("reply");
        assert_eq!(redact_error(&err), "codespace: wasm, code: 5");

        let err = WasmError::InsufficientFunds("1stake < 2stake".into());
        assert_eq!(redact_error(&err), "codespace: sdk, code: 5");
    }

    #[test]
    fn test_redact_passes_system_errors() {
        let err = WasmError::System(SystemError::NoSuchContract {
            addr: "wasm1xyz".into(),
        });
        assert_eq!(redact_error(&err), "No such contract: wasm1xyz");
    }

    #[test]
    fn test_redact_drops_context_around_system_errors() {
        let err = WasmError::System(SystemError::InvalidRequest {
            error: "expected value".into(),
            request: "{".into(),
        })
        .wrap("dispatch")
        .wrap("reply");
        assert_eq!(redact_error(&err), "Cannot parse request: expected value in: {");
    }

    #[test]
    fn test_submsg_gas_limit_is_recoverable() {
        let err = WasmError::SubMsgGasLimit { limit: 10 };
        assert!(!err.is_fatal());
        assert_eq!(err.codespace(), SDK_CODESPACE);
        assert_eq!(err.code(), 11);
    }

    #[test]
    fn test_store_error_conversion() {
        let err: WasmError = StoreError::ReadOnly.into();
        assert_eq!(err.code(), 1);
        assert_eq!(err.to_string(), "store is read-only");
    }
}
