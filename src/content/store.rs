//! Course storage.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use serde::Deserialize;

use crate::content::{CourseChanges, CourseFilter, CourseGuard};
use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{CourseDoc, Modifier, COURSE_COLLECTION};
use crate::policy::Visibility;
use crate::types::Result;

/// Backing store for courses.
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Insert a course; a taken sharing code is `DuplicateKey`.
    async fn insert(&self, course: CourseDoc) -> Result<ObjectId>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<CourseDoc>>;

    /// Creator, visibility and version only.
    async fn find_guard(&self, id: ObjectId) -> Result<Option<CourseGuard>>;

    /// Whether a course other than `except` uses `sharing_code`.
    async fn sharing_code_exists(&self, sharing_code: i32, except: Option<ObjectId>) -> Result<bool>;

    /// Courses matching `filter`, best first, at most `limit`.
    async fn search(&self, filter: &CourseFilter, limit: i64) -> Result<Vec<CourseDoc>>;

    /// Apply `changes` only if the stored version is still `expected_ver`,
    /// incrementing it by one. Returns false when no such version exists.
    async fn update_versioned(
        &self,
        id: ObjectId,
        expected_ver: i64,
        changes: &CourseChanges,
        modifier: &Modifier,
    ) -> Result<bool>;
}

#[derive(Deserialize)]
struct GuardDoc {
    header: GuardHeader,
    #[serde(default)]
    visibility: Visibility,
}

#[derive(Deserialize)]
struct GuardHeader {
    created_id: ObjectId,
    rec_ver: i64,
}

/// Filter and update documents for a conditional write: the filter pins the
/// expected `rec_ver`, the update bumps it.
fn versioned_update(
    id: ObjectId,
    expected_ver: i64,
    changes: &CourseChanges,
    modifier: &Modifier,
) -> (Document, Document) {
    let filter = doc! { "_id": id, "header.rec_ver": expected_ver };
    let update = doc! {
        "$set": {
            "name": changes.name.as_str(),
            "visibility": i32::from(changes.visibility),
            "sharing_code": changes.sharing_code,
            "series_code": changes.series_code,
            "game_code": changes.game_code,
            "car_class_code": changes.car_class_code,
            "header.modified_id": modifier.user_id,
            "header.modified_name": modifier.user_name.as_str(),
            "header.modified_ts": modifier.at,
            "header.touched_ts": modifier.at,
        },
        "$inc": { "header.rec_ver": 1_i64 },
    };
    (filter, update)
}

/// MongoDB-backed course store
#[derive(Clone)]
pub struct MongoCourseStore {
    courses: MongoCollection<CourseDoc>,
}

impl MongoCourseStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            courses: client.collection(COURSE_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl CourseStore for MongoCourseStore {
    async fn insert(&self, course: CourseDoc) -> Result<ObjectId> {
        self.courses.insert_one(course).await
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<CourseDoc>> {
        self.courses.find_one(doc! { "_id": id }).await
    }

    async fn find_guard(&self, id: ObjectId) -> Result<Option<CourseGuard>> {
        let guard: Option<GuardDoc> = self
            .courses
            .find_one_projected(
                doc! { "_id": id },
                doc! { "_id": 0, "header.created_id": 1, "header.rec_ver": 1, "visibility": 1 },
            )
            .await?;

        Ok(guard.map(|g| CourseGuard {
            created_id: g.header.created_id,
            visibility: g.visibility,
            rec_ver: g.header.rec_ver,
        }))
    }

    async fn sharing_code_exists(&self, sharing_code: i32, except: Option<ObjectId>) -> Result<bool> {
        let mut filter = doc! { "sharing_code": sharing_code };
        if let Some(id) = except {
            filter.insert("_id", doc! { "$ne": id });
        }

        let found: Option<Document> = self
            .courses
            .find_one_projected(filter, doc! { "_id": 1 })
            .await?;
        Ok(found.is_some())
    }

    async fn search(&self, filter: &CourseFilter, limit: i64) -> Result<Vec<CourseDoc>> {
        self.courses
            .find_many(
                filter.to_document(),
                Some(CourseFilter::sort_document()),
                Some(limit),
            )
            .await
    }

    async fn update_versioned(
        &self,
        id: ObjectId,
        expected_ver: i64,
        changes: &CourseChanges,
        modifier: &Modifier,
    ) -> Result<bool> {
        let (filter, update) = versioned_update(id, expected_ver, changes, modifier);
        let matched = self.courses.update_one(filter, update).await?;

        Ok(matched == 1)
    }
}
