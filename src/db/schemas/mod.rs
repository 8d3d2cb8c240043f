//! Database schemas for garage
//!
//! Defines MongoDB document structures for users, social relations and courses.

mod course;
mod header;
mod relation;
mod user;

pub use course::{CourseDoc, COURSE_COLLECTION, COURSE_TYPE_CUSTOM};
pub use header::{Header, Modifier, INITIAL_REC_VER};
pub use relation::{RelationDoc, RelationKind, SOCIAL_COLLECTION};
pub use user::{default_language, Privacy, UserDoc, UserIdentity, LAST_SEEN_KEEP, USER_COLLECTION};
