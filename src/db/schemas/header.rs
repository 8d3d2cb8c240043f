//! Audit header shared by content documents
//!
//! Tracks who created and last modified a record, its rating, and the
//! optimistic-lock version.

use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Version assigned to a freshly created record
pub const INITIAL_REC_VER: i64 = 1;

/// Audit header embedded in content documents
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Header {
    /// Creator of the record
    pub created_id: ObjectId,

    /// Creator's login name at creation time
    #[serde(default)]
    pub created_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_ts: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_id: Option<ObjectId>,

    #[serde(default)]
    pub modified_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_ts: Option<DateTime>,

    /// Last time anything happened to the record (sort key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touched_ts: Option<DateTime>,

    #[serde(default)]
    pub rating: f64,

    /// Optimistic-lock version, incremented once per successful update
    pub rec_ver: i64,
}

impl Header {
    /// Header for a record created now by `created_id`
    pub fn new(created_id: ObjectId, created_name: String) -> Self {
        let now = DateTime::now();
        Self {
            created_id,
            created_name,
            created_ts: Some(now),
            modified_id: None,
            modified_name: String::new(),
            modified_ts: None,
            touched_ts: Some(now),
            rating: 0.0,
            rec_ver: INITIAL_REC_VER,
        }
    }
}

/// Identity stamped on a record by an update
#[derive(Debug, Clone)]
pub struct Modifier {
    pub user_id: ObjectId,
    pub user_name: String,
    pub at: DateTime,
}

impl Modifier {
    pub fn now(user_id: ObjectId, user_name: String) -> Self {
        Self {
            user_id,
            user_name,
            at: DateTime::now(),
        }
    }
}
