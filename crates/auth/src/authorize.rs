use thiserror::Error;

use crate::{Action, Ownership, Role, decide};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role {role} may not {action:?}")]
    Forbidden { role: Role, action: Action },

    #[error("forbidden: role {0} is not allowed here")]
    RoleNotAllowed(Role),
}

/// Plain role check: the profile's role must be one of `allowed`.
///
/// - No IO
/// - No panics
pub fn require_role(role: Role, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthzError::RoleNotAllowed(role))
    }
}

/// Capability check through the policy table.
pub fn authorize(role: Role, action: Action, ownership: Ownership) -> Result<(), AuthzError> {
    if decide(role, action, ownership).is_allowed() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { role, action })
    }
}
