//! User document schema
//!
//! Stores login credentials, role tier and profile data.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::IntoIndexes;
use crate::types::DuplicateField;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Number of login timestamps kept per user
pub const LAST_SEEN_KEEP: i32 = 5;

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Unique login name, also the display name
    pub login_name: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default = "default_language")]
    pub language: String,

    /// Unique e-mail address
    pub email: String,

    #[serde(default)]
    pub xbox_tag: String,

    /// What other users see of this profile
    #[serde(default)]
    pub privacy: Privacy,

    /// Most recent logins, newest last
    #[serde(default)]
    pub last_seen: Vec<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

/// Profile privacy, stored as its numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Privacy {
    /// Login name and Xbox gamertag are both shown
    #[default]
    ShowAll = 0,
    /// Only the login name is shown to others
    UserName = 1,
    /// Only the Xbox gamertag is shown to others
    XboxTag = 2,
}

impl From<Privacy> for i32 {
    fn from(p: Privacy) -> Self {
        p as i32
    }
}

impl TryFrom<i32> for Privacy {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Privacy::ShowAll),
            1 => Ok(Privacy::UserName),
            2 => Ok(Privacy::XboxTag),
            other => Err(format!("unknown privacy code {other}")),
        }
    }
}

pub fn default_language() -> String {
    "en".to_string()
}

impl UserDoc {
    /// Create a new user document
    pub fn new(login_name: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            _id: None,
            login_name,
            password_hash,
            role,
            language: default_language(),
            email,
            xbox_tag: String::new(),
            privacy: Privacy::default(),
            last_seen: Vec::new(),
            created_at: Some(DateTime::now()),
        }
    }
}

/// Fields needed to build credentials (projection of `UserDoc`)
#[derive(Deserialize, Clone, Debug)]
pub struct UserIdentity {
    pub login_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_language")]
    pub language: String,
}

impl UserIdentity {
    pub fn projection() -> Document {
        doc! { "_id": 0, "login_name": 1, "role": 1, "language": 1 }
    }
}

impl From<&UserDoc> for UserIdentity {
    fn from(user: &UserDoc) -> Self {
        Self {
            login_name: user.login_name.clone(),
            role: user.role,
            language: user.language.clone(),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "login_name": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("login_name_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }

    fn duplicate_field(message: &str) -> Option<DuplicateField> {
        if message.contains("email_unique") {
            Some(DuplicateField::EMail)
        } else if message.contains("login_name_unique") {
            Some(DuplicateField::LoginName)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_field_from_index_message() {
        let msg = "E11000 duplicate key error collection: garage.users index: email_unique dup key";
        assert_eq!(UserDoc::duplicate_field(msg), Some(DuplicateField::EMail));

        let msg = "E11000 duplicate key error collection: garage.users index: login_name_unique";
        assert_eq!(UserDoc::duplicate_field(msg), Some(DuplicateField::LoginName));

        assert_eq!(UserDoc::duplicate_field("something else"), None);
    }

    #[test]
    fn test_identity_defaults() {
        let identity: UserIdentity =
            bson::from_document(doc! { "login_name": "roger" }).unwrap();
        assert_eq!(identity.role, Role::Guest);
        assert_eq!(identity.language, "en");
    }

    #[test]
    fn test_privacy_code_defaults_and_rejects_unknown() {
        let user: UserDoc = bson::from_document(doc! {
            "login_name": "roger",
            "password_hash": "x",
            "email": "roger@example.com",
        })
        .unwrap();
        assert_eq!(user.privacy, Privacy::ShowAll);

        let stored = bson::to_document(&UserDoc {
            privacy: Privacy::XboxTag,
            ..user
        })
        .unwrap();
        assert_eq!(stored.get_i32("privacy").unwrap(), 2);

        assert!(Privacy::try_from(7).is_err());
    }
}
