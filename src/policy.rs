//! Visibility tiers and the access decision for content items
//!
//! `grant` is used for both reads and updates. Its check order decides
//! which rejection a caller receives, and clients render a different hint
//! for each one:
//!
//! 1. Admin role always passes
//! 2. FriendsOnly item, Guest role: `Guest`
//! 3. FriendsOnly item, caller neither creator nor friend: `NotFriend`
//! 4. Private item, caller not creator: `Private`
//! 5. Everything else passes (Public always)

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credentials::Credentials;

/// Per-item access class, stored as its numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[derive(Default)]
pub enum Visibility {
    #[default]
    Public = 0,
    FriendsOnly = 1,
    Private = 2,
}

impl From<Visibility> for i32 {
    fn from(v: Visibility) -> Self {
        v as i32
    }
}

impl TryFrom<i32> for Visibility {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Visibility::Public),
            1 => Ok(Visibility::FriendsOnly),
            2 => Ok(Visibility::Private),
            other => Err(format!("unknown visibility code {other}")),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::FriendsOnly => write!(f, "friends"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Why access to an item was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PermissionDenied {
    /// Needs a login (and friends)
    #[error("user is guest")]
    Guest,
    /// Needs to be friends with the creator
    #[error("item is not shared")]
    NotFriend,
    /// Only the creator may access it
    #[error("item is private")]
    Private,
}

/// Decide whether `credentials` may access an item with the given
/// visibility created by `creator_id`.
pub fn grant(
    visibility: Visibility,
    creator_id: ObjectId,
    credentials: &Credentials,
) -> Result<(), PermissionDenied> {
    if credentials.role.is_admin() {
        return Ok(());
    }

    let is_creator = credentials.user_id == Some(creator_id);

    if visibility == Visibility::FriendsOnly && credentials.role.is_guest() {
        return Err(PermissionDenied::Guest);
    }

    if visibility == Visibility::FriendsOnly && !is_creator && !credentials.is_friend(&creator_id) {
        return Err(PermissionDenied::NotFriend);
    }

    if visibility == Visibility::Private && !is_creator {
        return Err(PermissionDenied::Private);
    }

    Ok(())
}
