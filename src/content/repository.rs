//! Course repository: scoped search, guarded reads and optimistic updates.
//!
//! Updates follow a fixed sequence so the caller gets the most specific
//! rejection:
//!
//! 1. Load creator, visibility and version (`NoData` if the course is gone)
//! 2. Resolve the caller's credentials
//! 3. `policy::grant` with the same rules as reads
//! 4. Compare the client's version with the stored one (`RecordChanged`)
//! 5. Validate and write, conditional on the version still matching
//!
//! Step 5 is what makes concurrent writers safe: of N updates carrying the
//! same version exactly one matches the filter. The losers surface as
//! `RecordChanged` and are never retried here.

use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use tracing::{debug, info};

use crate::content::{
    CourseChanges, CourseFilter, CourseListItem, CourseStore, CourseUpdate, CourseView,
    SearchParams, PAGE_SIZE,
};
use crate::credentials::{CredentialResolver, Credentials};
use crate::db::bounded;
use crate::db::schemas::{CourseDoc, Header, Modifier, COURSE_TYPE_CUSTOM};
use crate::policy::grant;
use crate::types::{GarageError, Result};

pub struct CourseRepository {
    store: Arc<dyn CourseStore>,
    credentials: Arc<dyn CredentialResolver>,
    timeout: Duration,
}

/// Id and name of a logged-in caller, or `Unauthorized`
fn author(credentials: &Credentials, action: &str) -> Result<(ObjectId, String)> {
    match (credentials.user_id, credentials.login_name.as_ref()) {
        (Some(id), Some(name)) => Ok((id, name.clone())),
        _ => Err(GarageError::Unauthorized(format!("login required to {}", action))),
    }
}

impl CourseRepository {
    pub fn new(
        store: Arc<dyn CourseStore>,
        credentials: Arc<dyn CredentialResolver>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            credentials,
            timeout,
        }
    }

    /// Courses visible to `credentials` that match `params`.
    ///
    /// `NoData` when nothing matches.
    pub async fn search(
        &self,
        params: &SearchParams,
        credentials: &Credentials,
    ) -> Result<Vec<CourseListItem>> {
        let filter = CourseFilter::new(params, credentials)?;
        let courses = bounded(
            self.timeout,
            "courses.search",
            self.store.search(&filter, PAGE_SIZE),
        )
        .await?;

        if courses.is_empty() {
            return Err(GarageError::NoData("no courses match".into()));
        }

        Ok(courses.iter().map(CourseListItem::from).collect())
    }

    /// A single course, if `credentials` may read it.
    pub async fn get(&self, id: ObjectId, credentials: &Credentials) -> Result<CourseView> {
        let course = bounded(self.timeout, "courses.find_by_id", self.store.find_by_id(id))
            .await?
            .ok_or_else(|| GarageError::NoData(format!("course {}", id)))?;

        grant(course.visibility, course.header.created_id, credentials)?;

        Ok(CourseView::from(course))
    }

    /// Whether `sharing_code` is used by a course other than `except`.
    pub async fn sharing_code_exists(
        &self,
        sharing_code: i32,
        except: Option<ObjectId>,
    ) -> Result<bool> {
        bounded(
            self.timeout,
            "courses.sharing_code_exists",
            self.store.sharing_code_exists(sharing_code, except),
        )
        .await
    }

    /// Create a course owned by the caller; returns its id.
    pub async fn create(&self, changes: CourseChanges, caller_id: &str) -> Result<ObjectId> {
        let credentials = self.credentials.resolve(caller_id).await?;
        let (user_id, user_name) = author(&credentials, "create courses")?;
        let changes = changes.validate()?;

        let course = CourseDoc {
            _id: None,
            header: Header::new(user_id, user_name),
            visibility: changes.visibility,
            type_code: COURSE_TYPE_CUSTOM,
            sharing_code: changes.sharing_code,
            name: changes.name,
            series_code: changes.series_code,
            game_code: changes.game_code,
            car_class_code: changes.car_class_code,
        };

        let id = bounded(self.timeout, "courses.insert", self.store.insert(course)).await?;
        info!(course_id = %id, created_by = %user_id, "Course created");
        Ok(id)
    }

    /// Apply `update` to course `id` on behalf of `caller_id`.
    ///
    /// Returns the new version.
    pub async fn update(&self, id: ObjectId, update: CourseUpdate, caller_id: &str) -> Result<i64> {
        let guard = bounded(self.timeout, "courses.find_guard", self.store.find_guard(id))
            .await?
            .ok_or_else(|| GarageError::NoData(format!("course {}", id)))?;

        let credentials = self.credentials.resolve(caller_id).await?;

        if let Err(denied) = grant(guard.visibility, guard.created_id, &credentials) {
            debug!(course_id = %id, caller = %caller_id, reason = %denied, "Update refused");
            return Err(denied.into());
        }

        if guard.rec_ver != update.rec_ver {
            debug!(
                course_id = %id,
                stored = guard.rec_ver,
                supplied = update.rec_ver,
                "Stale course version"
            );
            return Err(GarageError::RecordChanged);
        }

        let (user_id, user_name) = author(&credentials, "update courses")?;
        let changes = update.changes.validate()?;
        let modifier = Modifier::now(user_id, user_name);

        let written = bounded(
            self.timeout,
            "courses.update",
            self.store
                .update_versioned(id, update.rec_ver, &changes, &modifier),
        )
        .await?;

        // another writer got there between the guard read and the write
        if !written {
            debug!(course_id = %id, "Conditional write lost");
            return Err(GarageError::RecordChanged);
        }

        let new_ver = update.rec_ver + 1;
        info!(course_id = %id, modified_by = %user_id, rec_ver = new_ver, "Course updated");
        Ok(new_ver)
    }
}
