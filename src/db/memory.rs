//! In-memory stores
//!
//! Implement the same store traits as the MongoDB collections, including
//! unique constraints and the conditional version write. Used in dev mode
//! when no database is reachable, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use tokio::sync::RwLock;

use crate::content::{CourseChanges, CourseFilter, CourseGuard, CourseStore};
use crate::db::schemas::{CourseDoc, Modifier, RelationDoc, UserDoc, UserIdentity, LAST_SEEN_KEEP};
use crate::social::{Endpoint, RelationQuery, SocialStore};
use crate::types::{DuplicateField, GarageError, Result};
use crate::users::{ProfileSettings, UserStore};

// =============================================================================
// Users
// =============================================================================

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<ObjectId, UserDoc>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, mut user: UserDoc) -> Result<ObjectId> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.login_name == user.login_name) {
            return Err(GarageError::DuplicateKey(DuplicateField::LoginName));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(GarageError::DuplicateKey(DuplicateField::EMail));
        }

        let id = user._id.unwrap_or_else(ObjectId::new);
        user._id = Some(id);
        users.insert(id, user);
        Ok(id)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_login(&self, login_name: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.login_name == login_name)
            .cloned())
    }

    async fn identity(&self, id: ObjectId) -> Result<Option<UserIdentity>> {
        Ok(self.users.read().await.get(&id).map(UserIdentity::from))
    }

    async fn push_last_seen(&self, id: ObjectId, at: DateTime) -> Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_seen.push(at);
            let keep = LAST_SEEN_KEEP as usize;
            if user.last_seen.len() > keep {
                let excess = user.last_seen.len() - keep;
                user.last_seen.drain(..excess);
            }
        }
        Ok(())
    }

    async fn set_password(&self, id: ObjectId, password_hash: &str) -> Result<bool> {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_settings(&self, id: ObjectId, settings: &ProfileSettings) -> Result<bool> {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.xbox_tag = settings.xbox_tag.clone();
                user.privacy = settings.privacy;
                user.language = settings.language.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Relations
// =============================================================================

#[derive(Default)]
pub struct MemorySocialStore {
    relations: RwLock<Vec<RelationDoc>>,
}

impl MemorySocialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SocialStore for MemorySocialStore {
    async fn insert(&self, mut relation: RelationDoc) -> Result<ObjectId> {
        let mut relations = self.relations.write().await;

        let exact = RelationQuery::new(
            relation.rel_type,
            Endpoint::Pair(relation.user_id, relation.ref_id),
        );
        if relations.iter().any(|r| exact.matches(r)) {
            return Err(GarageError::DuplicateKey(DuplicateField::Relation));
        }

        let id = relation._id.unwrap_or_else(ObjectId::new);
        relation._id = Some(id);
        relations.push(relation);
        Ok(id)
    }

    async fn find(&self, query: &RelationQuery) -> Result<Vec<RelationDoc>> {
        Ok(self
            .relations
            .read()
            .await
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn delete(&self, query: &RelationQuery) -> Result<u64> {
        let mut relations = self.relations.write().await;
        match relations.iter().position(|r| query.matches(r)) {
            Some(index) => {
                relations.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

// =============================================================================
// Courses
// =============================================================================

#[derive(Default)]
pub struct MemoryCourseStore {
    courses: RwLock<HashMap<ObjectId, CourseDoc>>,
}

impl MemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn code_taken(courses: &HashMap<ObjectId, CourseDoc>, code: i32, except: Option<ObjectId>) -> bool {
    courses
        .iter()
        .any(|(id, c)| c.sharing_code == code && Some(*id) != except)
}

#[async_trait]
impl CourseStore for MemoryCourseStore {
    async fn insert(&self, mut course: CourseDoc) -> Result<ObjectId> {
        let mut courses = self.courses.write().await;

        if code_taken(&courses, course.sharing_code, None) {
            return Err(GarageError::DuplicateKey(DuplicateField::SharingCode));
        }

        let id = course._id.unwrap_or_else(ObjectId::new);
        course._id = Some(id);
        courses.insert(id, course);
        Ok(id)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<CourseDoc>> {
        Ok(self.courses.read().await.get(&id).cloned())
    }

    async fn find_guard(&self, id: ObjectId) -> Result<Option<CourseGuard>> {
        Ok(self.courses.read().await.get(&id).map(|c| CourseGuard {
            created_id: c.header.created_id,
            visibility: c.visibility,
            rec_ver: c.header.rec_ver,
        }))
    }

    async fn sharing_code_exists(&self, sharing_code: i32, except: Option<ObjectId>) -> Result<bool> {
        Ok(code_taken(&*self.courses.read().await, sharing_code, except))
    }

    async fn search(&self, filter: &CourseFilter, limit: i64) -> Result<Vec<CourseDoc>> {
        let mut found: Vec<CourseDoc> = self
            .courses
            .read()
            .await
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        found.sort_by(CourseFilter::compare);
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn update_versioned(
        &self,
        id: ObjectId,
        expected_ver: i64,
        changes: &CourseChanges,
        modifier: &Modifier,
    ) -> Result<bool> {
        // compare and write under one lock
        let mut courses = self.courses.write().await;

        match courses.get(&id) {
            Some(c) if c.header.rec_ver == expected_ver => {}
            _ => return Ok(false),
        }
        if code_taken(&courses, changes.sharing_code, Some(id)) {
            return Err(GarageError::DuplicateKey(DuplicateField::SharingCode));
        }

        let Some(course) = courses.get_mut(&id) else {
            return Ok(false);
        };
        course.name = changes.name.clone();
        course.visibility = changes.visibility;
        course.sharing_code = changes.sharing_code;
        course.series_code = changes.series_code;
        course.game_code = changes.game_code;
        course.car_class_code = changes.car_class_code;
        course.header.modified_id = Some(modifier.user_id);
        course.header.modified_name = modifier.user_name.clone();
        course.header.modified_ts = Some(modifier.at);
        course.header.touched_ts = Some(modifier.at);
        course.header.rec_ver += 1;
        Ok(true)
    }
}
