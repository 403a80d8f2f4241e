//! # Authorization Policies
//!
//! | Policy | Used for | Behavior |
//! |--------|----------|----------|
//! | `DefaultAuthorizationPolicy` | transaction messages | access configs and contract admin |
//! | `GovAuthorizationPolicy` | governance and other privileged callers | always allows |

use crate::domain::entities::AccessConfig;
use crate::domain::value_objects::Address;
use crate::ports::outbound::AuthorizationPolicy;

/// Enforces per-address access lists and the contract admin.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAuthorizationPolicy;

impl AuthorizationPolicy for DefaultAuthorizationPolicy {
    fn can_create_code(&self, upload_access: &AccessConfig, actor: &Address) -> bool {
        upload_access.allowed(actor)
    }

    fn can_instantiate_contract(&self, config: &AccessConfig, actor: &Address) -> bool {
        config.allowed(actor)
    }

    fn can_modify_contract(&self, admin: Option<&Address>, actor: &Address) -> bool {
        admin == Some(actor)
    }

    fn can_modify_code_access_config(&self, creator: &Address, actor: &Address, is_subset: bool) -> bool {
        creator == actor && is_subset
    }
}

/// Allows everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct GovAuthorizationPolicy;

impl AuthorizationPolicy for GovAuthorizationPolicy {
    fn can_create_code(&self, _upload_access: &AccessConfig, _actor: &Address) -> bool {
        true
    }

    fn can_instantiate_contract(&self, _config: &AccessConfig, _actor: &Address) -> bool {
        true
    }

    fn can_modify_contract(&self, _admin: Option<&Address>, _actor: &Address) -> bool {
        true
    }

    fn can_modify_code_access_config(&self, _creator: &Address, _actor: &Address, _is_subset: bool) -> bool {
        true
    }
}
