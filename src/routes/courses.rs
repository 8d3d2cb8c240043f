//! Course routes
//!
//! - GET  /courses?search=&type=&series=&game=   scoped search
//! - GET  /courses/{id}                          single course (counted as a visit)
//! - POST /courses                               create
//! - PUT  /courses/{id}                          optimistic update
//! - GET  /courses/sharing/{code}?except={id}    sharing code availability

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::content::{CourseChanges, CourseUpdate, SearchParams};
use crate::db::schemas::INITIAL_REC_VER;
use crate::routes::{json_response, list_response, parse_id, RequestContext};
use crate::server::AppState;
use crate::types::{GarageError, Result};

/// Id and current version of a written course
#[derive(Serialize)]
struct VersionResponse {
    id: String,
    rec_ver: i64,
}

#[derive(Serialize)]
struct SharingCodeResponse {
    sharing_code: i32,
    exists: bool,
}

#[derive(Deserialize, Default)]
struct SharingCodeQuery {
    #[serde(default)]
    except: Option<String>,
}

/// GET /courses
pub async fn search(state: &AppState, ctx: &RequestContext) -> Result<Response<Full<Bytes>>> {
    let params: SearchParams = ctx.query()?;
    let credentials = state.credentials.resolve(ctx.caller()).await?;
    list_response(state.courses.search(&params, &credentials).await)
}

/// GET /courses/{id}
pub async fn get_course(
    state: &AppState,
    ctx: &RequestContext,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let id = parse_id(raw_id)?;
    let credentials = state.credentials.resolve(ctx.caller()).await?;
    let course = state.courses.get(id, &credentials).await?;

    let profile_key = format!("course:{}", course.id);
    if state.registry.continue_request(&ctx.client_key, &profile_key) {
        state
            .visits
            .log_course_visit(&course.id, ctx.caller_id.clone())
            .await;
    }

    Ok(json_response(StatusCode::OK, &course))
}

/// POST /courses
pub async fn create_course(state: &AppState, ctx: &RequestContext) -> Result<Response<Full<Bytes>>> {
    ctx.require_caller()?;
    let changes: CourseChanges = ctx.json()?;
    let id = state.courses.create(changes, ctx.caller()).await?;
    Ok(json_response(
        StatusCode::CREATED,
        &VersionResponse {
            id: id.to_hex(),
            rec_ver: INITIAL_REC_VER,
        },
    ))
}

/// PUT /courses/{id}
pub async fn update_course(
    state: &AppState,
    ctx: &RequestContext,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    ctx.require_caller()?;
    let id = parse_id(raw_id)?;
    let update: CourseUpdate = ctx.json()?;
    let rec_ver = state.courses.update(id, update, ctx.caller()).await?;
    Ok(json_response(
        StatusCode::OK,
        &VersionResponse {
            id: id.to_hex(),
            rec_ver,
        },
    ))
}

/// GET /courses/sharing/{code}
pub async fn sharing_code(
    state: &AppState,
    ctx: &RequestContext,
    raw_code: &str,
) -> Result<Response<Full<Bytes>>> {
    let code: i32 = raw_code
        .parse()
        .map_err(|_| GarageError::Validation(format!("sharing code '{}'", raw_code)))?;
    let query: SharingCodeQuery = ctx.query()?;
    let except = query.except.as_deref().map(parse_id).transpose()?;

    let exists = state.courses.sharing_code_exists(code, except).await?;
    Ok(json_response(
        StatusCode::OK,
        &SharingCodeResponse {
            sharing_code: code,
            exists,
        },
    ))
}
