//! # Event Schema
//!
//! Types and attribute keys of the events the runtime emits, plus the
//! conversion of contract output into ledger events.
//!
//! | Event | Emitted by | Attributes |
//! |-------|------------|------------|
//! | `store_code` | create | `code_id`, one `feature` per required capability |
//! | `instantiate` | instantiate | `_contract_address`, `code_id` |
//! | `execute` | execute | `_contract_address` |
//! | `migrate` | migrate | `code_id`, `_contract_address` |
//! | `sudo` | sudo | `_contract_address` |
//! | `reply` | reply | `_contract_address` |
//! | `pin_code` / `unpin_code` | pin / unpin | `code_id` |
//! | `wasm` | contract response | `_contract_address`, then contract attributes |
//! | `wasm-<type>` | contract response | `_contract_address`, then event attributes |

use crate::domain::invariants::{check_attributes, check_event_type};
use crate::domain::messages::{Attribute, Event};
use crate::domain::value_objects::{Address, CodeId};
use crate::errors::WasmResult;

// =============================================================================
// EVENT TYPES
// =============================================================================

/// Code upload.
pub const EVENT_TYPE_STORE_CODE: &str = "store_code";
/// Contract instantiation.
pub const EVENT_TYPE_INSTANTIATE: &str = "instantiate";
/// Contract execution.
pub const EVENT_TYPE_EXECUTE: &str = "execute";
/// Contract migration.
pub const EVENT_TYPE_MIGRATE: &str = "migrate";
/// Code pinned in the engine cache.
pub const EVENT_TYPE_PIN_CODE: &str = "pin_code";
/// Code unpinned from the engine cache.
pub const EVENT_TYPE_UNPIN_CODE: &str = "unpin_code";
/// Privileged call.
pub const EVENT_TYPE_SUDO: &str = "sudo";
/// Reply call.
pub const EVENT_TYPE_REPLY: &str = "reply";
/// Admin changed.
pub const EVENT_TYPE_UPDATE_ADMIN: &str = "update_contract_admin";
/// Coin transfer.
pub const EVENT_TYPE_TRANSFER: &str = "transfer";
/// Message level metadata, never forwarded from submessages.
pub const EVENT_TYPE_MESSAGE: &str = "message";

/// Event carrying the attributes of a contract response.
pub const WASM_MODULE_EVENT_TYPE: &str = "wasm";
/// Prefix of contract defined event types.
pub const CUSTOM_CONTRACT_EVENT_PREFIX: &str = "wasm-";

// =============================================================================
// ATTRIBUTE KEYS
// =============================================================================

/// Address of the emitting contract. The leading underscore reserves it.
pub const ATTRIBUTE_KEY_CONTRACT_ADDR: &str = "_contract_address";
/// Code identifier.
pub const ATTRIBUTE_KEY_CODE_ID: &str = "code_id";
/// Capability required by stored code.
pub const ATTRIBUTE_KEY_REQUIRED_FEATURE: &str = "feature";
/// New admin, empty when cleared.
pub const ATTRIBUTE_KEY_NEW_ADMIN: &str = "new_admin_address";
/// Sender of a transfer or message.
pub const ATTRIBUTE_KEY_SENDER: &str = "sender";
/// Recipient of a transfer.
pub const ATTRIBUTE_KEY_RECIPIENT: &str = "recipient";
/// Transferred coins.
pub const ATTRIBUTE_KEY_AMOUNT: &str = "amount";

// =============================================================================
// BUILDERS
// =============================================================================

/// `store_code` event.
#[must_use]
pub fn store_code_event<'a>(code_id: CodeId, features: impl IntoIterator<Item = &'a String>) -> Event {
    let mut event = Event::new(EVENT_TYPE_STORE_CODE).add_attribute(ATTRIBUTE_KEY_CODE_ID, code_id.to_string());
    for feature in features {
        event = event.add_attribute(ATTRIBUTE_KEY_REQUIRED_FEATURE, feature.as_str());
    }
    event
}

/// `instantiate` event.
#[must_use]
pub fn instantiate_event(contract: &Address, code_id: CodeId) -> Event {
    Event::new(EVENT_TYPE_INSTANTIATE)
        .add_attribute(ATTRIBUTE_KEY_CONTRACT_ADDR, contract.to_string())
        .add_attribute(ATTRIBUTE_KEY_CODE_ID, code_id.to_string())
}

/// `migrate` event.
#[must_use]
pub fn migrate_event(contract: &Address, code_id: CodeId) -> Event {
    Event::new(EVENT_TYPE_MIGRATE)
        .add_attribute(ATTRIBUTE_KEY_CODE_ID, code_id.to_string())
        .add_attribute(ATTRIBUTE_KEY_CONTRACT_ADDR, contract.to_string())
}

/// Event of `ty` naming only the contract (`execute`, `sudo`, `reply`).
#[must_use]
pub fn contract_call_event(ty: &str, contract: &Address) -> Event {
    Event::new(ty).add_attribute(ATTRIBUTE_KEY_CONTRACT_ADDR, contract.to_string())
}

/// `pin_code` or `unpin_code` event.
#[must_use]
pub fn pin_event(ty: &str, code_id: CodeId) -> Event {
    Event::new(ty).add_attribute(ATTRIBUTE_KEY_CODE_ID, code_id.to_string())
}

/// Admin change event. `None` means the admin was cleared.
#[must_use]
pub fn update_admin_event(contract: &Address, new_admin: Option<&Address>) -> Event {
    Event::new(EVENT_TYPE_UPDATE_ADMIN)
        .add_attribute(ATTRIBUTE_KEY_CONTRACT_ADDR, contract.to_string())
        .add_attribute(
            ATTRIBUTE_KEY_NEW_ADMIN,
            new_admin.map(ToString::to_string).unwrap_or_default(),
        )
}

// =============================================================================
// CONTRACT OUTPUT
// =============================================================================

/// The `wasm` event for a response's attributes, `None` when there are none.
pub fn new_wasm_module_event(attrs: &[Attribute], contract: &Address) -> WasmResult<Option<Event>> {
    if attrs.is_empty() {
        return Ok(None);
    }
    let mut attributes = Vec::with_capacity(attrs.len() + 1);
    attributes.push(Attribute::new(ATTRIBUTE_KEY_CONTRACT_ADDR, contract.to_string()));
    attributes.extend(check_attributes(attrs)?);
    Ok(Some(Event {
        ty: WASM_MODULE_EVENT_TYPE.to_string(),
        attributes,
    }))
}

/// `wasm-<type>` events for a response's custom events.
pub fn new_custom_events(events: &[Event], contract: &Address) -> WasmResult<Vec<Event>> {
    events
        .iter()
        .map(|event| {
            let ty = check_event_type(event)?;
            let mut attributes = Vec::with_capacity(event.attributes.len() + 1);
            attributes.push(Attribute::new(ATTRIBUTE_KEY_CONTRACT_ADDR, contract.to_string()));
            attributes.extend(check_attributes(&event.attributes)?);
            Ok(Event {
                ty: format!("{CUSTOM_CONTRACT_EVENT_PREFIX}{ty}"),
                attributes,
            })
        })
        .collect()
}

/// Drops `message` events, which stay with the message that caused them.
#[must_use]
pub fn filter_message_events(events: Vec<Event>) -> Vec<Event> {
    events
        .into_iter()
        .filter(|e| e.ty != EVENT_TYPE_MESSAGE)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WasmError;

    fn contract() -> Address {
        Address::new(vec![5u8; 32])
    }

    #[test]
    fn test_wasm_event_leads_with_contract() {
        let event = new_wasm_module_event(&[Attribute::new("action", "deposit")], &contract())
            .unwrap()
            .unwrap();
        assert_eq!(event.ty, "wasm");
        assert_eq!(event.attributes[0].key, ATTRIBUTE_KEY_CONTRACT_ADDR);
        assert_eq!(event.attribute("action"), Some("deposit"));
        assert!(new_wasm_module_event(&[], &contract()).unwrap().is_none());
    }

    #[test]
    fn test_custom_event_prefix_and_trim() {
        let events = new_custom_events(
            &[Event::new(" hello ").add_attribute(" key ", "value")],
            &contract(),
        )
        .unwrap();
        assert_eq!(events[0].ty, "wasm-hello");
        assert_eq!(events[0].attribute("key"), Some("value"));
    }

    #[test]
    fn test_custom_event_rejects_short_type_and_reserved_keys() {
        assert!(matches!(
            new_custom_events(&[Event::new("ab")], &contract()),
            Err(WasmError::InvalidEvent(_))
        ));
        assert!(matches!(
            new_custom_events(
                &[Event::new("abc").add_attribute("_contract_address", "spoof")],
                &contract()
            ),
            Err(WasmError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_filter_message_events() {
        let events = vec![Event::new("message"), Event::new("transfer")];
        let kept = filter_message_events(events);
        assert_eq!(kept, vec![Event::new("transfer")]);
    }

    #[test]
    fn test_store_code_event_features() {
        let features = ["iterator".to_string(), "staking".to_string()];
        let event = store_code_event(3, &features);
        assert_eq!(event.attribute("code_id"), Some("3"));
        assert_eq!(event.attributes.iter().filter(|a| a.key == "feature").count(), 2);
    }
}
