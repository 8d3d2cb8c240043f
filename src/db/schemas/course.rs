//! Course document schema
//!
//! A shareable course record. The in-game sharing code is unique across the
//! collection.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Header;
use crate::policy::Visibility;
use crate::types::DuplicateField;

/// Collection name for courses
pub const COURSE_COLLECTION: &str = "courses";

/// Type code of user-created courses
pub const COURSE_TYPE_CUSTOM: i32 = 1;

/// Course document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CourseDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    pub header: Header,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default)]
    pub type_code: i32,

    /// In-game sharing code (unique)
    pub sharing_code: i32,

    pub name: String,

    #[serde(default)]
    pub series_code: i32,

    #[serde(default)]
    pub game_code: i32,

    #[serde(default)]
    pub car_class_code: i32,
}

impl IntoIndexes for CourseDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "sharing_code": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("sharing_code_unique".to_string())
                        .build(),
                ),
            ),
            // search sort order
            (
                doc! { "header.rating": -1, "header.touched_ts": -1 },
                Some(
                    IndexOptions::builder()
                        .name("rating_touched_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "header.created_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("created_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }

    fn duplicate_field(message: &str) -> Option<DuplicateField> {
        message
            .contains("sharing_code")
            .then_some(DuplicateField::SharingCode)
    }
}
