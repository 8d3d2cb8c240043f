//! Role tiers resolved for every caller

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role tier of a caller, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
#[derive(Default)]
pub enum Role {
    /// Anonymous visitor or unconfirmed account - public items only
    #[default]
    Guest = 0,
    /// Registered user - own items, friends' shared items
    Member = 1,
    /// Sees and edits everything
    Admin = 2,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    pub fn is_guest(self) -> bool {
        self == Role::Guest
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Guest => write!(f, "GUEST"),
            Role::Member => write!(f, "MEMBER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}
