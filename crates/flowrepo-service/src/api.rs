//! HTTP surface
//!
//! Routes, all below the configured prefix:
//! - `GET    /info` service identity and uptime
//! - `GET    /health-check` liveness
//! - `PUT    /flow/` create, answers `201 {"_id": ...}`
//! - `POST   /flow/{id}/` update
//! - `DELETE /flow/{id}/` delete, answers `204`
//! - `GET    /flow` list (`limit`, `offset`, `order=field:asc|desc`, `search`)
//! - `GET    /flow/{id}` fetch one
//!
//! Failures are answered as `{"error": message}`. Responses carry CORS
//! headers for any origin and an `X-Request-Id`, echoed from the request or
//! generated.

use crate::repository::AccessControlledRepository;
use flowrepo_core::{Caller, Credential, Flow, FlowId, ListArgs, RepoError, ADMIN_ROLE};
use flowrepo_permissions::TokenClaims;
use serde::Serialize;
use std::convert::Infallible;
use ulid::Ulid;
use warp::filters::BoxedFilter;
use warp::http::header::{HeaderMap, HeaderValue};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Header carrying the service version on every response
pub const HEADER_API_VERSION: &str = "X-Api-Version";

/// Header carrying the service name on every response
pub const HEADER_SERVICE_NAME: &str = "X-Service-Name";

/// Header correlating a request with its response, generated when absent
pub const HEADER_REQUEST_ID: &str = "X-Request-Id";

/// Liveness route, excluded from request logging
pub const HEALTH_CHECK_PATH: &str = "health-check";

/// Caller id used when a token carries no subject
pub const ANONYMOUS_USER: &str = "dummy";

const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug)]
struct Failure(RepoError);

impl warp::reject::Reject for Failure {}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct Created {
    #[serde(rename = "_id")]
    id: FlowId,
}

/// HTTP status answering `err`
#[must_use]
pub fn status_of(err: &RepoError) -> StatusCode {
    match err {
        RepoError::NotFound(_) => StatusCode::NOT_FOUND,
        RepoError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        RepoError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        RepoError::EnrichmentFailed { .. } => StatusCode::BAD_GATEWAY,
        RepoError::AuthorityUnavailable(_) | RepoError::StoreUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        RepoError::AuthorityRejected(_) | RepoError::StoreConflict(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Identify the caller of a request
///
/// An admin (per `X-User-Roles`) may act for `for_user`. Otherwise the id is
/// `X-UserId`, else the token subject. The bearer token is forwarded as the
/// credential unchanged.
#[must_use]
pub fn resolve_caller(
    user_header: Option<&str>,
    authorization: Option<&str>,
    roles_header: Option<&str>,
    for_user: Option<&str>,
) -> Caller {
    let credential = Credential::bearer(authorization.unwrap_or_default());

    let is_admin = roles_header
        .is_some_and(|roles| roles.split(',').any(|role| role.trim() == ADMIN_ROLE));
    if let Some(target) = for_user.filter(|u| !u.is_empty() && is_admin) {
        return Caller::new(target, credential);
    }

    if let Some(user) = user_header.filter(|u| !u.is_empty()) {
        return Caller::new(user, credential);
    }

    let user_id = match authorization.filter(|a| !a.is_empty()).map(TokenClaims::decode) {
        Some(Ok(claims)) if claims.sub.is_empty() => ANONYMOUS_USER.to_string(),
        Some(Ok(claims)) => claims.sub,
        Some(Err(_)) | None => String::new(),
    };
    Caller::new(user_id, credential)
}

fn caller() -> impl Filter<Extract = (Caller,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-userid")
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::header::optional::<String>("x-user-roles"))
        .and(warp::query::<Vec<(String, String)>>())
        .map(
            |user: Option<String>,
             auth: Option<String>,
             roles: Option<String>,
             query: Vec<(String, String)>| {
                let for_user = query
                    .iter()
                    .find(|(key, _)| key == "for_user")
                    .map(|(_, value)| value.as_str());
                resolve_caller(user.as_deref(), auth.as_deref(), roles.as_deref(), for_user)
            },
        )
}

fn prefix(segments: &[String]) -> BoxedFilter<()> {
    segments
        .iter()
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment.clone())).boxed()
        })
}

fn static_headers(repo: &AccessControlledRepository) -> HeaderMap {
    let info = repo.info();
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&info.version) {
        headers.insert(HEADER_API_VERSION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&info.name) {
        headers.insert(HEADER_SERVICE_NAME, value);
    }
    headers
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(|| Ulid::new().to_string(), str::to_string)
}

fn cors() -> warp::filters::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS", "PUT"])
        .allow_headers(vec!["Origin", "Content-Type", "Authorization"])
        .expose_headers(vec!["Content-Length", HEADER_REQUEST_ID])
        .allow_credentials(true)
}

fn reject(err: RepoError) -> Rejection {
    warp::reject::custom(Failure(err))
}

/// Every route of the service, mounted below `prefix`
pub fn routes(
    repo: AccessControlledRepository,
    prefix_segments: &[String],
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let headers = static_headers(&repo);
    let repo = warp::any().map(move || repo.clone());

    let info = warp::get()
        .and(warp::path!("info"))
        .and(repo.clone())
        .map(|repo: AccessControlledRepository| warp::reply::json(&repo.info()).into_response());

    let health = warp::get()
        .and(warp::path(HEALTH_CHECK_PATH))
        .and(warp::path::end())
        .and(repo.clone())
        .and_then(health_check);

    let create = warp::put()
        .and(warp::path!("flow"))
        .and(caller())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(repo.clone())
        .and_then(create_flow);

    let update = warp::post()
        .and(warp::path!("flow" / String))
        .and(caller())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(repo.clone())
        .and_then(update_flow);

    let delete = warp::delete()
        .and(warp::path!("flow" / String))
        .and(caller())
        .and(repo.clone())
        .and_then(delete_flow);

    let list = warp::get()
        .and(warp::path!("flow"))
        .and(caller())
        .and(warp::query::<Vec<(String, String)>>())
        .and(repo.clone())
        .and_then(list_flows);

    let get = warp::get()
        .and(warp::path!("flow" / String))
        .and(caller())
        .and(repo)
        .and_then(get_flow);

    let api = info
        .or(health)
        .unify()
        .or(create)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(list)
        .unify()
        .or(get)
        .unify();

    let served = prefix(prefix_segments)
        .and(api)
        .with(cors())
        .recover(handle_rejection)
        .with(warp::reply::with::headers(headers));

    warp::header::headers_cloned()
        .map(|headers: HeaderMap| request_id(&headers))
        .and(served)
        .map(|id: String, reply| warp::reply::with_header(reply, HEADER_REQUEST_ID, id))
        .with(warp::log::custom(|info| {
            if info.path().ends_with(HEALTH_CHECK_PATH) {
                return;
            }
            tracing::info!(
                method = %info.method(),
                path = info.path(),
                status = info.status().as_u16(),
                elapsed_ms = u64::try_from(info.elapsed().as_millis()).unwrap_or(u64::MAX),
                "request"
            );
        }))
}

async fn health_check(repo: AccessControlledRepository) -> Result<Response, Rejection> {
    repo.health_check().await.map_err(reject)?;
    Ok(StatusCode::OK.into_response())
}

async fn create_flow(
    caller: Caller,
    flow: Flow,
    repo: AccessControlledRepository,
) -> Result<Response, Rejection> {
    let id = repo.create_flow(flow, &caller).await.map_err(reject)?;
    Ok(warp::reply::with_status(warp::reply::json(&Created { id }), StatusCode::CREATED)
        .into_response())
}

async fn update_flow(
    id: String,
    caller: Caller,
    flow: Flow,
    repo: AccessControlledRepository,
) -> Result<Response, Rejection> {
    repo.update_flow(&FlowId::new(id), flow, &caller)
        .await
        .map_err(reject)?;
    Ok(StatusCode::OK.into_response())
}

async fn delete_flow(
    id: String,
    caller: Caller,
    repo: AccessControlledRepository,
) -> Result<Response, Rejection> {
    repo.delete_flow(&FlowId::new(id), &caller)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_flows(
    caller: Caller,
    query: Vec<(String, String)>,
    repo: AccessControlledRepository,
) -> Result<Response, Rejection> {
    let args = ListArgs::from_query_pairs(query).map_err(reject)?;
    let flows = repo.list_flows(&caller, args).await.map_err(reject)?;
    Ok(warp::reply::json(&flows).into_response())
}

async fn get_flow(
    id: String,
    caller: Caller,
    repo: AccessControlledRepository,
) -> Result<Response, Rejection> {
    let flow = repo
        .get_flow(&FlowId::new(id), &caller)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&flow).into_response())
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody { error: message }), status)
        .into_response()
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    if let Some(Failure(err)) = rejection.find::<Failure>() {
        let status = status_of(err);
        if !err.is_client_error() {
            tracing::error!(error = %err, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %err, status = status.as_u16(), "request refused");
        }
        return Ok(error_reply(status, &err.to_string()));
    }

    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "no such route".to_string())
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = rejection.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large".to_string())
    } else if let Some(err) = rejection.find::<warp::filters::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, err.to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };
    Ok(error_reply(status, &message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrepo_core::Capability;
    use flowrepo_permissions::unsigned_token;
    use serde_json::json;

    #[test]
    fn status_mapping() {
        let id = FlowId::new("f1");
        assert_eq!(status_of(&RepoError::NotFound(id.clone())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(&RepoError::denied(Capability::Read, &id)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(&RepoError::InvalidQuery("limit".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(&RepoError::enrichment("op1", "down")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(&RepoError::StoreUnavailable("disk".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn caller_from_user_header() {
        let caller = resolve_caller(Some("alice"), Some("Bearer t"), None, None);
        assert_eq!(caller.user_id, "alice");
        assert_eq!(caller.credential, Credential::bearer("Bearer t"));
    }

    #[test]
    fn caller_from_token_subject() {
        let token = unsigned_token(&json!({"sub": "bob"}));
        assert_eq!(resolve_caller(None, Some(token.as_str()), None, None).user_id, "bob");

        let anonymous = unsigned_token(&json!({}));
        assert_eq!(
            resolve_caller(None, Some(anonymous.as_str()), None, None).user_id,
            ANONYMOUS_USER
        );
        assert_eq!(resolve_caller(None, Some("garbage"), None, None).user_id, "");
    }

    #[test]
    fn request_id_is_echoed_or_generated() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers).len(), 26);

        headers.insert(HEADER_REQUEST_ID, HeaderValue::from_static("req-7"));
        assert_eq!(request_id(&headers), "req-7");

        headers.insert(HEADER_REQUEST_ID, HeaderValue::from_static(""));
        assert_ne!(request_id(&headers), "");
    }

    #[test]
    fn for_user_requires_admin_role() {
        let as_admin = resolve_caller(Some("root"), Some("t"), Some("user, admin"), Some("carol"));
        assert_eq!(as_admin.user_id, "carol");

        let as_user = resolve_caller(Some("bob"), Some("t"), Some("user"), Some("carol"));
        assert_eq!(as_user.user_id, "bob");
    }
}
