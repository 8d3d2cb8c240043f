//! Social relation document schema
//!
//! One record per relation. A friendship is stored once, in the direction
//! it was created; `following` is stored from follower to followee and
//! read backwards to list followers.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::IntoIndexes;
use crate::types::DuplicateField;

/// Collection name for relations
pub const SOCIAL_COLLECTION: &str = "social";

/// Stored relation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Undirected: either endpoint may have created it
    Friend,
    /// Directed: `user_id` follows `ref_id`
    Following,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Friend => "friend",
            RelationKind::Following => "following",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RelationDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Endpoint that created the relation
    pub user_id: ObjectId,
    pub user_name: String,

    /// Referenced endpoint
    pub ref_id: ObjectId,
    pub ref_name: String,

    /// What `ref_id` points at (always "user" for social relations)
    #[serde(default = "default_ref_type")]
    pub ref_type: String,

    pub rel_type: RelationKind,
}

fn default_ref_type() -> String {
    "user".to_string()
}

impl RelationDoc {
    pub fn new(
        kind: RelationKind,
        user_id: ObjectId,
        user_name: String,
        ref_id: ObjectId,
        ref_name: String,
    ) -> Self {
        Self {
            _id: None,
            user_id,
            user_name,
            ref_id,
            ref_name,
            ref_type: default_ref_type(),
            rel_type: kind,
        }
    }
}

impl IntoIndexes for RelationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // one record per stored direction; the graph also checks the reverse
            (
                doc! { "rel_type": 1, "user_id": 1, "ref_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("rel_pair_unique".to_string())
                        .build(),
                ),
            ),
            // forward reads: friends created by me, who I follow
            (
                doc! { "rel_type": 1, "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("rel_user_index".to_string())
                        .build(),
                ),
            ),
            // inverse reads: friends created by others, my followers
            (
                doc! { "rel_type": 1, "ref_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("rel_ref_index".to_string())
                        .build(),
                ),
            ),
        ]
    }

    fn duplicate_field(message: &str) -> Option<DuplicateField> {
        message
            .contains("rel_pair_unique")
            .then_some(DuplicateField::Relation)
    }
}
