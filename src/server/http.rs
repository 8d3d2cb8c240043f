//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Requests are routed by
//! method and path segments; handlers get a `RequestContext` with the
//! collected body and the verified caller.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{AUTHORIZATION, HeaderMap};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::extract_token_from_header;
use crate::registry::spawn_flush_task;
use crate::routes::{
    self, courses, error_response, preflight_response, users, RequestContext, MAX_BODY_BYTES,
};
use crate::routes::users::RelationList;
use crate::server::AppState;
use crate::types::{GarageError, Result};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "garage listening on {} ({} store)",
        state.args.listen, state.store_backend
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure JWT secret may be in use");
    }

    spawn_flush_task(
        Arc::clone(&state.registry),
        state.args.registry_flush_interval(),
    );
    info!(
        "Request registry enabled (sweep above {} entries, ttl {}s)",
        state.registry.config().sweep_threshold,
        state.registry.config().ttl.as_secs()
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    Ok(to_boxed(dispatch(state, addr, req).await))
}

/// Route a request to its handler and render the outcome.
///
/// Generic over the body so tests can drive it with in-memory requests.
pub async fn dispatch<B>(state: Arc<AppState>, addr: SocketAddr, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return preflight_response();
    }

    let ctx = match request_context(&state, addr, req).await {
        Ok(ctx) => ctx,
        Err(e) => return error_response(e),
    };

    match route(&state, &ctx, &method, &path).await {
        Ok(response) => response,
        Err(e) => error_response(e),
    }
}

async fn request_context<B>(state: &AppState, addr: SocketAddr, req: Request<B>) -> Result<RequestContext>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    let caller_id = caller_from_headers(state, &parts.headers)?;
    let client_key = client_key(&parts.headers, addr);

    let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Request body rejected: {}", e);
            return Err(GarageError::BadRequest(format!(
                "request body unreadable or larger than {} bytes",
                MAX_BODY_BYTES
            )));
        }
    };

    Ok(RequestContext {
        caller_id,
        client_key,
        query: parts.uri.query().map(str::to_string),
        body,
    })
}

/// Verified caller id from the bearer token; no token means anonymous
fn caller_from_headers(state: &AppState, headers: &HeaderMap) -> Result<Option<String>> {
    let header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    match extract_token_from_header(header) {
        Some(token) => {
            let claims = state.users.jwt().verify_token(token)?;
            Ok(Some(claims.sub))
        }
        None => Ok(None),
    }
}

/// Client identity for visit deduplication: first forwarded address, else the peer ip
fn client_key(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string())
}

async fn route(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    method: &Method,
    path: &str,
) -> Result<Response<Full<Bytes>>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (&Method::GET, ["health"]) => Ok(routes::health_check(Arc::clone(state))),

        (&Method::POST, ["login"]) => users::login(state, ctx).await,
        (&Method::POST, ["users"]) => users::create_user(state, ctx).await,
        (&Method::GET, ["users", id]) => users::get_profile(state, ctx, id).await,
        (&Method::PUT, ["users", "me"]) => users::update_settings(state, ctx).await,
        (&Method::PUT, ["users", "me", "password"]) => users::change_password(state, ctx).await,
        (&Method::GET, ["users", id, list]) => match RelationList::from_segment(list) {
            Some(list) => users::list_relations(state, ctx, id, list).await,
            None => Err(not_found(path)),
        },
        (&Method::POST, ["users", "me", "friends", other]) => users::add_friend(state, ctx, other).await,
        (&Method::DELETE, ["users", "me", "friends", other]) => {
            users::remove_friend(state, ctx, other).await
        }
        (&Method::POST, ["users", "me", "following", other]) => users::follow(state, ctx, other).await,
        (&Method::DELETE, ["users", "me", "following", other]) => {
            users::unfollow(state, ctx, other).await
        }

        (&Method::GET, ["courses"]) => courses::search(state, ctx).await,
        (&Method::POST, ["courses"]) => courses::create_course(state, ctx).await,
        (&Method::GET, ["courses", "sharing", code]) => courses::sharing_code(state, ctx, code).await,
        (&Method::GET, ["courses", id]) => courses::get_course(state, ctx, id).await,
        (&Method::PUT, ["courses", id]) => courses::update_course(state, ctx, id).await,

        _ => Err(not_found(path)),
    }
}

fn not_found(path: &str) -> GarageError {
    GarageError::NotFound(path.to_string())
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let addr: SocketAddr = "10.1.2.3:5555".parse().unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, addr), "10.1.2.3");

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers, addr), "203.0.113.7");

        headers.insert("x-forwarded-for", " ".parse().unwrap());
        assert_eq!(client_key(&headers, addr), "10.1.2.3");
    }
}
