//! # Domain Invariants
//!
//! Checks that must hold before the keeper touches state or calls the engine.
//!
//! | Check | Where it is enforced |
//! |-------|----------------------|
//! | Query depth | `keeper/query.rs` before each smart query |
//! | Permission subset | `keeper/lifecycle.rs` on code upload and access updates |
//! | Event shape | `keeper/lifecycle.rs` when a response is turned into events |

use crate::domain::entities::AccessConfig;
use crate::domain::messages::{Attribute, Event};
use crate::errors::{WasmError, WasmResult};

/// Shortest accepted custom event type, after trimming.
pub const MIN_EVENT_TYPE_LEN: usize = 2;

/// Prefix reserved for host generated attribute keys.
pub const RESERVED_ATTRIBUTE_PREFIX: char = '_';

// =============================================================================
// QUERY DEPTH
// =============================================================================

/// Nested smart queries may go `max` levels deep.
pub fn check_query_depth(depth: u32, max: u32) -> WasmResult<()> {
    if depth > max {
        return Err(WasmError::ExceedMaxQueryStackSize { depth, max });
    }
    Ok(())
}

// =============================================================================
// PERMISSIONS
// =============================================================================

/// An instantiate permission override may only narrow the default.
pub fn check_permission_subset(requested: &AccessConfig, default: &AccessConfig) -> WasmResult<()> {
    if !requested.is_subset(default) {
        return Err(WasmError::Unauthorized(
            "instantiate access must be subset of default upload access".into(),
        ));
    }
    Ok(())
}

// =============================================================================
// EVENTS
// =============================================================================

/// Trims and checks contract attributes.
///
/// Keys must be non-empty and must not use the reserved prefix.
pub fn check_attributes(attrs: &[Attribute]) -> WasmResult<Vec<Attribute>> {
    attrs
        .iter()
        .map(|attr| {
            let key = attr.key.trim();
            if key.is_empty() {
                return Err(WasmError::InvalidEvent(format!(
                    "Empty attribute key. Value: {}",
                    attr.value
                )));
            }
            if key.starts_with(RESERVED_ATTRIBUTE_PREFIX) {
                return Err(WasmError::InvalidEvent(format!(
                    "Attribute key starts with reserved prefix {RESERVED_ATTRIBUTE_PREFIX}: '{key}'"
                )));
            }
            Ok(Attribute::new(key, attr.value.trim()))
        })
        .collect()
}

/// Trims and checks a custom event type.
pub fn check_event_type(event: &Event) -> WasmResult<String> {
    let ty = event.ty.trim();
    if ty.len() <= MIN_EVENT_TYPE_LEN {
        return Err(WasmError::InvalidEvent(format!(
            "Event type too short: '{ty}'"
        )));
    }
    Ok(ty.to_string())
}
