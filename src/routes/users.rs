//! User and relation routes
//!
//! - POST   /users                      register
//! - POST   /login                      issue a token
//! - GET    /users/{id}                 profile (counted as a visit)
//! - PUT    /users/me                   update profile settings
//! - PUT    /users/me/password          change password
//! - GET    /users/{id}/friends         also /following, /followers
//! - POST   /users/me/friends/{id}      add friend (DELETE removes)
//! - POST   /users/me/following/{id}    follow (DELETE unfollows)
//!
//! `me` may be used in place of an id for the logged-in caller.

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::{json_response, list_response, no_content, parse_id, RequestContext};
use crate::server::AppState;
use crate::types::Result;
use crate::users::{LoginRequest, NewUser, PasswordChange, ProfileSettings};

/// Which relation list to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationList {
    Friends,
    Following,
    Followers,
}

impl RelationList {
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "friends" => Some(Self::Friends),
            "following" => Some(Self::Following),
            "followers" => Some(Self::Followers),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct CreatedResponse {
    id: String,
}

fn user_id(ctx: &RequestContext, raw: &str) -> Result<ObjectId> {
    if raw == "me" {
        ctx.require_caller()
    } else {
        parse_id(raw)
    }
}

/// POST /users
pub async fn create_user(state: &AppState, ctx: &RequestContext) -> Result<Response<Full<Bytes>>> {
    let new_user: NewUser = ctx.json()?;
    let id = state.users.create_user(new_user).await?;
    Ok(json_response(
        StatusCode::CREATED,
        &CreatedResponse { id: id.to_hex() },
    ))
}

/// POST /login
pub async fn login(state: &AppState, ctx: &RequestContext) -> Result<Response<Full<Bytes>>> {
    let request: LoginRequest = ctx.json()?;
    let response = state.users.login(request).await?;
    Ok(json_response(StatusCode::OK, &response))
}

/// GET /users/{id}
pub async fn get_profile(
    state: &AppState,
    ctx: &RequestContext,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let id = user_id(ctx, raw_id)?;
    let viewer = ctx.caller_id.as_deref().map(parse_id).transpose()?;
    let profile = state.users.profile(id, viewer, &state.graph).await?;

    let profile_key = format!("user:{}", profile.id);
    if state.registry.continue_request(&ctx.client_key, &profile_key) {
        state
            .visits
            .log_user_visit(&profile.id, ctx.caller_id.clone())
            .await;
    }

    Ok(json_response(StatusCode::OK, &profile))
}

/// PUT /users/me
pub async fn update_settings(state: &AppState, ctx: &RequestContext) -> Result<Response<Full<Bytes>>> {
    let me = ctx.require_caller()?;
    let settings: ProfileSettings = ctx.json()?;
    state.users.update_settings(me, settings).await?;
    Ok(no_content())
}

/// PUT /users/me/password
pub async fn change_password(state: &AppState, ctx: &RequestContext) -> Result<Response<Full<Bytes>>> {
    let me = ctx.require_caller()?;
    let change: PasswordChange = ctx.json()?;
    state.users.set_password(me, change).await?;
    Ok(no_content())
}

/// GET /users/{id}/friends|following|followers
pub async fn list_relations(
    state: &AppState,
    ctx: &RequestContext,
    raw_id: &str,
    list: RelationList,
) -> Result<Response<Full<Bytes>>> {
    let id = user_id(ctx, raw_id)?;
    let refs = match list {
        RelationList::Friends => state.graph.friends(id).await,
        RelationList::Following => state.graph.following(id).await,
        RelationList::Followers => state.graph.followers(id).await,
    };
    list_response(refs)
}

/// POST /users/me/friends/{id}
pub async fn add_friend(
    state: &AppState,
    ctx: &RequestContext,
    raw_other: &str,
) -> Result<Response<Full<Bytes>>> {
    let me = ctx.require_caller()?;
    let other = parse_id(raw_other)?;
    let relation = state.graph.add_friend(me, other).await?;
    Ok(json_response(StatusCode::CREATED, &relation))
}

/// DELETE /users/me/friends/{id}
pub async fn remove_friend(
    state: &AppState,
    ctx: &RequestContext,
    raw_other: &str,
) -> Result<Response<Full<Bytes>>> {
    let me = ctx.require_caller()?;
    let other = parse_id(raw_other)?;
    state.graph.remove_friend(me, other).await?;
    Ok(no_content())
}

/// POST /users/me/following/{id}
pub async fn follow(
    state: &AppState,
    ctx: &RequestContext,
    raw_other: &str,
) -> Result<Response<Full<Bytes>>> {
    let me = ctx.require_caller()?;
    let other = parse_id(raw_other)?;
    let relation = state.graph.follow(me, other).await?;
    Ok(json_response(StatusCode::CREATED, &relation))
}

/// DELETE /users/me/following/{id}
pub async fn unfollow(
    state: &AppState,
    ctx: &RequestContext,
    raw_other: &str,
) -> Result<Response<Full<Bytes>>> {
    let me = ctx.require_caller()?;
    let other = parse_id(raw_other)?;
    state.graph.unfollow(me, other).await?;
    Ok(no_content())
}
