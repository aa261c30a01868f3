//! Fixed role hierarchy.
//!
//! Lower level means more privilege. Authorization is an exact-level
//! membership test over the roles an identity carries; see
//! [`crate::services::authorization_service`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
    Writer,
}

impl Role {
    /// All roles, most privileged first.
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Editor, Role::Writer];

    /// Least privileged role; the fallback for unknown names.
    pub const LEAST_PRIVILEGED: Role = Role::Writer;

    pub fn level(&self) -> u8 {
        match self {
            Role::SuperAdmin => 0,
            Role::Admin => 1,
            Role::Editor => 2,
            Role::Writer => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Writer => "Writer",
        }
    }

    /// Strict lookup by name; `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|r| r.as_str() == name)
    }

    /// Lookup used by route gates. Unknown names resolve to the least
    /// privileged role instead of failing.
    pub fn resolve(name: &str) -> Self {
        Role::parse(name).unwrap_or_else(|| {
            tracing::warn!(
                target: "quill.authz",
                role = name,
                fallback = Role::LEAST_PRIVILEGED.as_str(),
                "Unknown role name, falling back to least privileged role"
            );
            Role::LEAST_PRIVILEGED
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
