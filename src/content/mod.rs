//! Courses: scoped search and optimistic updates
//!
//! - `filter`: caller-scoped search filters
//! - `model`: payloads and views
//! - `store`: course storage trait and MongoDB implementation
//! - `repository`: the operations handlers call

pub mod filter;
pub mod model;
pub mod repository;
pub mod store;

pub use filter::{CourseFilter, SearchParams, SearchTerm, VisibilityScope, NO_SHARING_CODE, PAGE_SIZE};
pub use model::{CourseChanges, CourseGuard, CourseListItem, CourseUpdate, CourseView};
pub use repository::CourseRepository;
pub use store::{CourseStore, MongoCourseStore};
