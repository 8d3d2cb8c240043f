//! Course payloads and views exchanged with clients.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::schemas::CourseDoc;
use crate::policy::Visibility;
use crate::types::{GarageError, Result};

/// Client-editable course fields
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CourseChanges {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub sharing_code: i32,
    pub series_code: i32,
    #[serde(default)]
    pub game_code: i32,
    #[serde(default)]
    pub car_class_code: i32,
}

impl CourseChanges {
    /// Trim and check the fields; returns the cleaned copy.
    pub fn validate(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(GarageError::Validation("course name is required".into()));
        }
        if self.sharing_code <= 0 {
            return Err(GarageError::Validation("sharing code is required".into()));
        }
        if self.series_code <= 0 {
            return Err(GarageError::Validation("series is required".into()));
        }
        Ok(self)
    }
}

/// Update request: the changes plus the version the client last read
#[derive(Debug, Clone, Deserialize)]
pub struct CourseUpdate {
    #[serde(flatten)]
    pub changes: CourseChanges,
    pub rec_ver: i64,
}

/// Fields an update is checked against before writing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseGuard {
    pub created_id: ObjectId,
    pub visibility: Visibility,
    pub rec_ver: i64,
}

/// Reduced course row for search results
#[derive(Debug, Clone, Serialize)]
pub struct CourseListItem {
    pub id: String,
    pub created_id: String,
    pub created_name: String,
    pub rating: f64,
    pub name: String,
    pub visibility: Visibility,
    pub sharing_code: i32,
    pub series_code: i32,
    pub car_class_code: i32,
}

impl From<&CourseDoc> for CourseListItem {
    fn from(course: &CourseDoc) -> Self {
        Self {
            id: course._id.map(|id| id.to_hex()).unwrap_or_default(),
            created_id: course.header.created_id.to_hex(),
            created_name: course.header.created_name.clone(),
            rating: course.header.rating,
            name: course.name.clone(),
            visibility: course.visibility,
            sharing_code: course.sharing_code,
            series_code: course.series_code,
            car_class_code: course.car_class_code,
        }
    }
}

/// Full course as returned by a single read
#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    pub id: String,
    pub created_id: String,
    pub created_name: String,
    pub created_ts: Option<DateTime<Utc>>,
    pub modified_name: String,
    pub modified_ts: Option<DateTime<Utc>>,
    pub rating: f64,
    pub rec_ver: i64,
    pub visibility: Visibility,
    pub type_code: i32,
    pub sharing_code: i32,
    pub name: String,
    pub series_code: i32,
    pub game_code: i32,
    pub car_class_code: i32,
}

impl From<CourseDoc> for CourseView {
    fn from(course: CourseDoc) -> Self {
        Self {
            id: course._id.map(|id| id.to_hex()).unwrap_or_default(),
            created_id: course.header.created_id.to_hex(),
            created_name: course.header.created_name,
            created_ts: course.header.created_ts.map(|t| t.to_chrono()),
            modified_name: course.header.modified_name,
            modified_ts: course.header.modified_ts.map(|t| t.to_chrono()),
            rating: course.header.rating,
            rec_ver: course.header.rec_ver,
            visibility: course.visibility,
            type_code: course.type_code,
            sharing_code: course.sharing_code,
            name: course.name,
            series_code: course.series_code,
            game_code: course.game_code,
            car_class_code: course.car_class_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes() -> CourseChanges {
        CourseChanges {
            name: "  Goliath  ".into(),
            visibility: Visibility::Public,
            sharing_code: 123_456_789,
            series_code: 2,
            game_code: 0,
            car_class_code: 0,
        }
    }

    #[test]
    fn test_validate_trims_name() {
        let cleaned = changes().validate().unwrap();
        assert_eq!(cleaned.name, "Goliath");
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut blank = changes();
        blank.name = "   ".into();
        assert!(matches!(blank.validate(), Err(GarageError::Validation(_))));

        let mut no_code = changes();
        no_code.sharing_code = 0;
        assert!(matches!(no_code.validate(), Err(GarageError::Validation(_))));

        let mut no_series = changes();
        no_series.series_code = 0;
        assert!(matches!(no_series.validate(), Err(GarageError::Validation(_))));
    }

    #[test]
    fn test_update_payload_flattens_changes() {
        let update: CourseUpdate = serde_json::from_str(
            r#"{"name":"Goliath","visibility":1,"sharing_code":42,"series_code":3,"rec_ver":7}"#,
        )
        .unwrap();
        assert_eq!(update.rec_ver, 7);
        assert_eq!(update.changes.visibility, Visibility::FriendsOnly);
        assert_eq!(update.changes.game_code, 0);
    }
}
