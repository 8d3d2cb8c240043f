//! Visit log for profile and course analytics
//!
//! Each counted view becomes one JSONL line. Refreshes are filtered out
//! upstream by the request registry, so every line is a distinct visit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// What kind of page was viewed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    User,
    Course,
}

/// One counted view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitEvent {
    pub timestamp: DateTime<Utc>,
    pub profile_type: ProfileType,
    /// Viewed user or course id
    pub profile_id: String,
    /// Logged-in visitor, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
}

impl VisitEvent {
    pub fn new(profile_type: ProfileType, profile_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            profile_type,
            profile_id,
            visitor_id: None,
        }
    }

    pub fn with_visitor(mut self, visitor_id: Option<String>) -> Self {
        self.visitor_id = visitor_id;
        self
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Appends visit events to a JSONL file, if one is configured
#[derive(Clone, Default)]
pub struct VisitLogger {
    inner: Arc<Mutex<VisitLoggerInner>>,
}

#[derive(Default)]
struct VisitLoggerInner {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl VisitLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start appending to `path`
    pub async fn init_file(&self, path: &Path) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));
        inner.path = Some(path.to_path_buf());

        info!("Visit logging initialized to {}", path.display());
        Ok(())
    }

    pub async fn path(&self) -> Option<PathBuf> {
        self.inner.lock().await.path.clone()
    }

    /// Record a visit. Never fails the request that caused it.
    pub async fn log(&self, event: VisitEvent) {
        info!(
            profile_type = ?event.profile_type,
            profile_id = %event.profile_id,
            visitor = event.visitor_id.as_deref().unwrap_or("-"),
            "Visit"
        );

        let line = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize visit event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", line) {
                error!("Failed to write visit event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush visit log: {}", e);
            }
        }
    }

    pub async fn log_user_visit(&self, user_id: &str, visitor_id: Option<String>) {
        self.log(VisitEvent::new(ProfileType::User, user_id.to_string()).with_visitor(visitor_id))
            .await;
    }

    pub async fn log_course_visit(&self, course_id: &str, visitor_id: Option<String>) {
        self.log(
            VisitEvent::new(ProfileType::Course, course_id.to_string()).with_visitor(visitor_id),
        )
        .await;
    }
}
