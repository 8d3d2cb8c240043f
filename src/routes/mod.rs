//! HTTP route handlers for garage
//!
//! Handlers receive a `RequestContext` with the collected body and the
//! verified caller, and return a JSON response or a `GarageError` that the
//! server renders as `{ "code", "msg" }`.

pub mod courses;
pub mod health;
pub mod users;

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::{Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::types::{GarageError, Result};

pub use health::health_check;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Everything a handler needs from the incoming request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Verified caller id (hex), absent for anonymous requests
    pub caller_id: Option<String>,
    /// Key identifying the client for visit deduplication
    pub client_key: String,
    pub query: Option<String>,
    pub body: Bytes,
}

impl RequestContext {
    /// Caller id for credential resolution; empty for anonymous callers
    pub fn caller(&self) -> &str {
        self.caller_id.as_deref().unwrap_or("")
    }

    /// The caller's id, or `Unauthorized` if not logged in
    pub fn require_caller(&self) -> Result<ObjectId> {
        let id = self
            .caller_id
            .as_deref()
            .ok_or_else(|| GarageError::Unauthorized("login required".into()))?;
        parse_id(id)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn query<T: DeserializeOwned>(&self) -> Result<T> {
        serde_urlencoded::from_str(self.query.as_deref().unwrap_or(""))
            .map_err(|e| GarageError::Validation(format!("query: {}", e)))
    }
}

pub fn parse_id(raw: &str) -> Result<ObjectId> {
    Ok(ObjectId::parse_str(raw)?)
}

fn with_common_headers(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

fn raw_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    with_common_headers(response)
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = raw_response(status, Bytes::from(json));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn no_content() -> Response<Full<Bytes>> {
    raw_response(StatusCode::NO_CONTENT, Bytes::new())
}

/// CORS preflight response
pub fn preflight_response() -> Response<Full<Bytes>> {
    raw_response(StatusCode::OK, Bytes::new())
}

/// Render an error; system errors are logged with detail and sent without it
pub fn error_response(err: GarageError) -> Response<Full<Bytes>> {
    if err.is_system() {
        error!(error = %err, "Request failed");
    } else {
        debug!(error = %err, "Request rejected");
    }

    let (status, body) = err.into_status_code_and_body();
    let mut response = raw_response(status, Bytes::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// List response where an empty result is 204 rather than an empty array
pub fn list_response<T: Serialize>(items: Result<Vec<T>>) -> Result<Response<Full<Bytes>>> {
    match items {
        Ok(items) if items.is_empty() => Ok(no_content()),
        Ok(items) => Ok(json_response(StatusCode::OK, &items)),
        Err(GarageError::NoData(_)) => Ok(no_content()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_error_response_hides_system_detail() {
        let response = error_response(GarageError::Database("connection refused at 10.0.0.1".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("99999"));
        assert!(!text.contains("10.0.0.1"));
    }

    #[test]
    fn test_list_response_empty_is_no_content() {
        let empty: Result<Vec<u8>> = Ok(Vec::new());
        assert_eq!(list_response(empty).unwrap().status(), StatusCode::NO_CONTENT);

        let no_data: Result<Vec<u8>> = Err(GarageError::NoData("none".into()));
        assert_eq!(list_response(no_data).unwrap().status(), StatusCode::NO_CONTENT);

        let failed: Result<Vec<u8>> = Err(GarageError::Timeout("x".into()));
        assert!(list_response(failed).is_err());
    }

    #[test]
    fn test_context_caller() {
        let ctx = RequestContext::default();
        assert_eq!(ctx.caller(), "");
        assert!(matches!(ctx.require_caller(), Err(GarageError::Unauthorized(_))));

        let id = ObjectId::new();
        let ctx = RequestContext {
            caller_id: Some(id.to_hex()),
            ..Default::default()
        };
        assert_eq!(ctx.require_caller().unwrap(), id);
    }
}
