//! Database layer for garage
//!
//! MongoDB storage for users, relations and courses, plus in-memory stores
//! implementing the same traits for dev mode and tests.

pub mod memory;
pub mod mongo;
pub mod schemas;

use std::future::Future;
use std::time::Duration;

pub use memory::{MemoryCourseStore, MemorySocialStore, MemoryUserStore};
pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{CourseDoc, Header, RelationDoc, RelationKind, UserDoc};

use crate::types::{GarageError, Result};

/// Default bound for a single store operation
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a store operation under a timeout.
///
/// An elapsed timeout is a system error; the operation is not retried.
pub async fn bounded<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(GarageError::Timeout(format!(
            "{} exceeded {}ms",
            operation,
            timeout.as_millis()
        ))),
    }
}
