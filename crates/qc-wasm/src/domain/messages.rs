//! # Contract Messages
//!
//! The JSON facing types exchanged with contracts: responses, submessages,
//! replies, ledger messages and query requests.

use crate::domain::value_objects::{Binary, Coin, CodeId};
use serde::{Deserialize, Serialize};

// =============================================================================
// EVENTS
// =============================================================================

/// Key/value pair of an event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A typed group of attributes. Used for ledger events and contract events.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Event type.
    #[serde(rename = "type")]
    pub ty: String,
    /// Ordered attributes.
    pub attributes: Vec<Attribute>,
}

impl Event {
    /// Creates an event without attributes.
    #[must_use]
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn add_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }

    /// Value of the first attribute with `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

// =============================================================================
// LEDGER MESSAGES
// =============================================================================

/// Bank module messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankMsg {
    /// Transfer from the contract to `to_address`.
    Send {
        /// Recipient in text form.
        to_address: String,
        /// Coins to move.
        amount: Vec<Coin>,
    },
}

/// Contract module messages, sent with the contract as sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmMsg {
    /// Execute another contract.
    Execute {
        /// Target contract.
        contract_addr: String,
        /// Execute message.
        msg: Binary,
        /// Funds sent along.
        funds: Vec<Coin>,
    },
    /// Instantiate new code.
    Instantiate {
        /// Admin of the new contract.
        admin: Option<String>,
        /// Code to instantiate.
        code_id: CodeId,
        /// Instantiate message.
        msg: Binary,
        /// Deposit.
        funds: Vec<Coin>,
        /// Label.
        label: String,
    },
    /// Migrate a contract the sender administers.
    Migrate {
        /// Target contract.
        contract_addr: String,
        /// New code.
        new_code_id: CodeId,
        /// Migrate message.
        msg: Binary,
    },
    /// Replace the admin of a contract the sender administers.
    UpdateAdmin {
        /// Target contract.
        contract_addr: String,
        /// New admin.
        admin: String,
    },
    /// Remove the admin of a contract the sender administers.
    ClearAdmin {
        /// Target contract.
        contract_addr: String,
    },
}

/// A ledger-native operation requested by a contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CosmosMsg {
    /// Bank operation.
    Bank(BankMsg),
    /// Contract operation.
    Wasm(WasmMsg),
    /// Application specific message, handled by a custom encoder.
    Custom(serde_json::Value),
}

impl From<BankMsg> for CosmosMsg {
    fn from(msg: BankMsg) -> Self {
        Self::Bank(msg)
    }
}

impl From<WasmMsg> for CosmosMsg {
    fn from(msg: WasmMsg) -> Self {
        Self::Wasm(msg)
    }
}

// =============================================================================
// SUBMESSAGES & REPLIES
// =============================================================================

/// When the issuing contract wants its reply entry point called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOn {
    /// Reply on both outcomes.
    Always,
    /// Reply on failure only.
    Error,
    /// Reply on success only.
    Success,
    /// Never reply; failures abort the whole call.
    Never,
}

/// A ledger message with an optional gas cap and reply callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMsg {
    /// Returned to the contract in the reply.
    pub id: u64,
    /// Message to dispatch.
    pub msg: CosmosMsg,
    /// Ledger gas cap paid for by the parent.
    pub gas_limit: Option<u64>,
    /// Reply policy.
    pub reply_on: ReplyOn,
}

impl SubMsg {
    /// Fire and forget message.
    #[must_use]
    pub fn new(msg: impl Into<CosmosMsg>) -> Self {
        Self::reply_on(msg, 0, ReplyOn::Never)
    }

    /// Message with a reply on success.
    #[must_use]
    pub fn reply_on_success(msg: impl Into<CosmosMsg>, id: u64) -> Self {
        Self::reply_on(msg, id, ReplyOn::Success)
    }

    /// Message with a reply on failure.
    #[must_use]
    pub fn reply_on_error(msg: impl Into<CosmosMsg>, id: u64) -> Self {
        Self::reply_on(msg, id, ReplyOn::Error)
    }

    /// Message with a reply on either outcome.
    #[must_use]
    pub fn reply_always(msg: impl Into<CosmosMsg>, id: u64) -> Self {
        Self::reply_on(msg, id, ReplyOn::Always)
    }

    /// Caps the ledger gas the message may use.
    #[must_use]
    pub fn with_gas_limit(mut self, limit: u64) -> Self {
        self.gas_limit = Some(limit);
        self
    }

    fn reply_on(msg: impl Into<CosmosMsg>, id: u64, reply_on: ReplyOn) -> Self {
        Self {
            id,
            msg: msg.into(),
            gas_limit: None,
            reply_on,
        }
    }
}

/// Successful submessage outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMsgResponse {
    /// Filtered events of the dispatched message.
    pub events: Vec<Event>,
    /// First data output of the dispatched message.
    pub data: Option<Binary>,
}

/// Outcome handed to the reply entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubMsgResult {
    /// The message succeeded.
    Ok(SubMsgResponse),
    /// The message failed; the text is redacted.
    Err(String),
}

impl SubMsgResult {
    /// Returns true for the success variant.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Reply delivered to the issuing contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Id of the submessage.
    pub id: u64,
    /// Its outcome.
    pub result: SubMsgResult,
}

/// Output of a contract entry point.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Submessages to dispatch, in order.
    pub messages: Vec<SubMsg>,
    /// Attributes for the `wasm` event.
    pub attributes: Vec<Attribute>,
    /// Custom events, emitted as `wasm-<type>`.
    pub events: Vec<Event>,
    /// Result data.
    pub data: Option<Binary>,
}

impl Response {
    /// Empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `wasm` event attribute.
    #[must_use]
    pub fn add_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }

    /// Adds a custom event.
    #[must_use]
    pub fn add_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Adds a fire and forget message.
    #[must_use]
    pub fn add_message(mut self, msg: impl Into<CosmosMsg>) -> Self {
        self.messages.push(SubMsg::new(msg));
        self
    }

    /// Adds a submessage.
    #[must_use]
    pub fn add_submessage(mut self, msg: SubMsg) -> Self {
        self.messages.push(msg);
        self
    }

    /// Sets the result data.
    #[must_use]
    pub fn set_data(mut self, data: impl Into<Binary>) -> Self {
        self.data = Some(data.into());
        self
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Bank queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankQuery {
    /// Balance of one denom.
    Balance {
        /// Account in text form.
        address: String,
        /// Denomination.
        denom: String,
    },
    /// All balances of an account.
    AllBalances {
        /// Account in text form.
        address: String,
    },
}

/// Staking queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingQuery {
    /// Denom used for staking.
    BondedDenom {},
    /// All active validators.
    AllValidators {},
    /// A single validator.
    Validator {
        /// Validator operator address.
        address: String,
    },
}

/// Contract queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmQuery {
    /// Call the query entry point.
    Smart {
        /// Target contract.
        contract_addr: String,
        /// Query message.
        msg: Binary,
    },
    /// Read a raw key of the contract namespace.
    Raw {
        /// Target contract.
        contract_addr: String,
        /// Storage key.
        key: Binary,
    },
    /// Contract metadata.
    ContractInfo {
        /// Target contract.
        contract_addr: String,
    },
}

/// IBC queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IbcQuery {
    /// Port bound to the calling contract.
    PortId {},
    /// Channels of a port.
    ListChannels {
        /// Port, defaults to the caller's.
        port_id: Option<String>,
    },
}

/// A query a contract issues through its querier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRequest {
    /// Bank module.
    Bank(BankQuery),
    /// Application specific.
    Custom(serde_json::Value),
    /// IBC module.
    Ibc(IbcQuery),
    /// Staking module.
    Staking(StakingQuery),
    /// Raw gRPC style query.
    Stargate {
        /// Query path.
        path: String,
        /// Encoded request.
        data: Binary,
    },
    /// Contract module.
    Wasm(WasmQuery),
}

impl QueryRequest {
    /// Name of the request kind, as reported for unsupported requests.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bank(_) => "bank",
            Self::Custom(_) => "custom",
            Self::Ibc(_) => "ibc",
            Self::Staking(_) => "staking",
            Self::Stargate { .. } => "stargate",
            Self::Wasm(_) => "wasm",
        }
    }
}

/// Response to [`BankQuery::Balance`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Balance, zero amount if none.
    pub amount: Coin,
}

/// Response to [`BankQuery::AllBalances`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllBalanceResponse {
    /// Non-zero balances ordered by denom.
    pub amount: Vec<Coin>,
}

/// Validator summary for staking queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Operator address.
    pub address: String,
    /// Commission rate as a decimal string.
    pub commission: String,
    /// Maximum commission rate as a decimal string.
    pub max_commission: String,
    /// Maximum daily change rate as a decimal string.
    pub max_change_rate: String,
}

/// Response to [`StakingQuery::BondedDenom`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondedDenomResponse {
    /// Staking denom.
    pub denom: String,
}

/// Response to [`StakingQuery::AllValidators`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllValidatorsResponse {
    /// Active validators.
    pub validators: Vec<Validator>,
}

/// Response to [`StakingQuery::Validator`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorResponse {
    /// The validator, if known.
    pub validator: Option<Validator>,
}

/// Response to [`WasmQuery::ContractInfo`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfoResponse {
    /// Backing code.
    pub code_id: CodeId,
    /// Instantiator.
    pub creator: String,
    /// Admin, if any.
    pub admin: Option<String>,
    /// Whether the code is pinned.
    pub pinned: bool,
    /// Bound IBC port, if any.
    pub ibc_port: Option<String>,
}

/// Response to [`IbcQuery::PortId`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortIdResponse {
    /// Port bound to the caller.
    pub port_id: String,
}

/// Data returned by a dispatched instantiate message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateResponse {
    /// New contract.
    pub address: String,
    /// Data returned by the contract.
    pub data: Option<Binary>,
}

/// Data returned by a dispatched execute or migrate message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Data returned by the contract.
    pub data: Option<Binary>,
}

// =============================================================================
// TESTS
// =============================================================================
