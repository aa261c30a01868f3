//! Role authorization.
//!
//! A check passes iff the caller carries a role at exactly the required
//! level. Holding a more privileged role does not imply the lesser ones;
//! identities are assigned every role they are entitled to.

use crate::models::Role;

/// Authorize against a role given by name.
///
/// Unknown names resolve to the least privileged role (see [`Role::resolve`]).
pub fn authorize(roles: &[Role], required_role_name: &str) -> bool {
    authorize_role(roles, Role::resolve(required_role_name))
}

pub fn authorize_role(roles: &[Role], required: Role) -> bool {
    roles.iter().any(|r| r.level() == required.level())
}
