//! Error types for garage
//!
//! Domain errors (no data, permission, conflict, invalid input) are returned
//! as typed variants so handlers can render targeted guidance. Everything
//! else is a system error: logged with its detail, rendered without it.

use hyper::StatusCode;
use serde::Serialize;

use crate::policy::PermissionDenied;

/// Application error codes sent to clients in the `code` field
pub mod codes {
    pub const INVALID_JSON: i32 = 10000;
    pub const INVALID_REQUEST: i32 = 10001;
    pub const INVALID_LOGIN: i32 = 10002;
    pub const NO_DATA: i32 = 10003;
    pub const RECORD_CHANGED: i32 = 10004;
    pub const PERMISSION_GUEST: i32 = 10006;
    pub const PERMISSION_NOT_SHARED: i32 = 10007;
    pub const PERMISSION_PRIVATE: i32 = 10008;
    pub const USER_NAME_TAKEN: i32 = 10009;
    pub const EMAIL_ADDRESS_TAKEN: i32 = 10010;
    pub const INVALID_FRIEND: i32 = 10012;
    pub const SHARING_CODE_TAKEN: i32 = 10014;
    pub const RELATION_EXISTS: i32 = 10015;
    pub const UNAUTHORIZED: i32 = 10016;
    pub const SYSTEM_ERROR: i32 = 99999;
}

/// Uniquely constrained field that rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    LoginName,
    EMail,
    SharingCode,
    Relation,
}

impl std::fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateField::LoginName => write!(f, "login name"),
            DuplicateField::EMail => write!(f, "e-mail address"),
            DuplicateField::SharingCode => write!(f, "sharing code"),
            DuplicateField::Relation => write!(f, "relation"),
        }
    }
}

/// Main error type for garage operations
#[derive(Debug, thiserror::Error)]
pub enum GarageError {
    #[error("No data: {0}")]
    NoData(String),

    #[error("Permission denied: {0}")]
    Permission(#[from] PermissionDenied),

    #[error("Record changed by another user")]
    RecordChanged,

    #[error("Duplicate {0}")]
    DuplicateKey(DuplicateField),

    #[error("A relation must reference another user")]
    SelfReference,

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid user name or password")]
    InvalidLogin,

    #[error("Store operation timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub msg: &'static str,
}

impl GarageError {
    /// True for failures that are not domain outcomes
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Database(_) | Self::Config(_) | Self::Internal(_)
        )
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoData(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // client renders these as application errors
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Application error code
    pub fn code(&self) -> i32 {
        match self {
            Self::NoData(_) => codes::NO_DATA,
            Self::Permission(PermissionDenied::Guest) => codes::PERMISSION_GUEST,
            Self::Permission(PermissionDenied::NotFriend) => codes::PERMISSION_NOT_SHARED,
            Self::Permission(PermissionDenied::Private) => codes::PERMISSION_PRIVATE,
            Self::RecordChanged => codes::RECORD_CHANGED,
            Self::DuplicateKey(DuplicateField::LoginName) => codes::USER_NAME_TAKEN,
            Self::DuplicateKey(DuplicateField::EMail) => codes::EMAIL_ADDRESS_TAKEN,
            Self::DuplicateKey(DuplicateField::SharingCode) => codes::SHARING_CODE_TAKEN,
            Self::DuplicateKey(DuplicateField::Relation) => codes::RELATION_EXISTS,
            Self::SelfReference => codes::INVALID_FRIEND,
            Self::InvalidId(_) | Self::Validation(_) | Self::NotFound(_) => codes::INVALID_REQUEST,
            Self::BadRequest(_) => codes::INVALID_JSON,
            Self::Unauthorized(_) => codes::UNAUTHORIZED,
            Self::InvalidLogin => codes::INVALID_LOGIN,
            Self::Timeout(_) | Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                codes::SYSTEM_ERROR
            }
        }
    }

    /// Message shown to clients; never carries internal detail
    pub fn client_message(&self) -> &'static str {
        match self.code() {
            codes::INVALID_JSON => "Invalid JSON",
            codes::INVALID_REQUEST => "Invalid Request",
            codes::INVALID_LOGIN => "invalid user name or password",
            codes::NO_DATA => "no data found",
            codes::RECORD_CHANGED => "record changed by another user",
            codes::PERMISSION_GUEST => "user is guest",
            codes::PERMISSION_NOT_SHARED => "item is not shared",
            codes::PERMISSION_PRIVATE => "item is private",
            codes::USER_NAME_TAKEN => "user name not available",
            codes::EMAIL_ADDRESS_TAKEN => "e-mail address already registered",
            codes::INVALID_FRIEND => "could not add or remove friend",
            codes::SHARING_CODE_TAKEN => "Duplicate Forza Share Code",
            codes::RELATION_EXISTS => "relation already exists",
            codes::UNAUTHORIZED => "authentication required",
            _ => "Server Problem",
        }
    }

    /// Convert to status code and JSON body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            msg: self.client_message(),
        };
        let json = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
        (status, json)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for GarageError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GarageError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for GarageError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for GarageError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::oid::Error> for GarageError {
    fn from(err: bson::oid::Error) -> Self {
        Self::InvalidId(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for GarageError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

/// Result type alias for garage operations
pub type Result<T> = std::result::Result<T, GarageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_codes_are_distinct() {
        let guest = GarageError::from(PermissionDenied::Guest).code();
        let not_friend = GarageError::from(PermissionDenied::NotFriend).code();
        let private = GarageError::from(PermissionDenied::Private).code();

        assert_eq!(guest, codes::PERMISSION_GUEST);
        assert_eq!(not_friend, codes::PERMISSION_NOT_SHARED);
        assert_eq!(private, codes::PERMISSION_PRIVATE);
    }

    #[test]
    fn test_conflicts_are_not_system_errors() {
        assert!(!GarageError::RecordChanged.is_system());
        assert!(!GarageError::DuplicateKey(DuplicateField::SharingCode).is_system());
        assert_eq!(
            GarageError::DuplicateKey(DuplicateField::SharingCode).code(),
            codes::SHARING_CODE_TAKEN
        );
        assert_ne!(GarageError::RecordChanged.code(), codes::SYSTEM_ERROR);
    }

    #[test]
    fn test_system_error_body_hides_detail() {
        let err = GarageError::Database("connection refused at 10.0.0.3:27017".into());
        assert!(err.is_system());

        let (status, body) = err.into_status_code_and_body();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("99999"));
        assert!(body.contains("Server Problem"));
        assert!(!body.contains("10.0.0.3"));
    }

    #[test]
    fn test_timeout_is_system_error() {
        let err = GarageError::Timeout("courses.find".into());
        assert!(err.is_system());
        assert_eq!(err.code(), codes::SYSTEM_ERROR);
    }
}
