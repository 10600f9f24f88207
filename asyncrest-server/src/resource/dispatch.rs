//! The framework's request pipeline: method check, authentication,
//! throttling, handler call and response creation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Kwargs, RequestType, Resource, ResourceRequest};
use crate::auth::authenticate;
use crate::error::ApiError;
use crate::state::AppState;

/// Return the lower-cased request method if `allowed` contains it.
pub fn method_check(request: &ResourceRequest, allowed: &[String]) -> Result<String, ApiError> {
    let method = request.method_name();
    if allowed.iter().any(|m| m.eq_ignore_ascii_case(&method)) {
        Ok(method)
    } else {
        debug!(%method, path = %request.path, "method not allowed");
        Err(ApiError::MethodNotAllowed {
            allowed: allowed.to_vec(),
        })
    }
}

/// Authenticate the request, storing the resulting context on it.
pub async fn is_authenticated<R: Resource + ?Sized>(
    state: &AppState,
    resource: &R,
    request: &mut ResourceRequest,
) -> Result<(), ApiError> {
    let required = resource.options().require_authentication;
    let auth = authenticate(state, &request.headers, required).await?;
    request.auth = Some(auth);
    Ok(())
}

/// Key the throttle charges: the user when known and enabled, otherwise the client address.
/// `None` when throttling does not apply.
fn throttle_identifier<R: Resource + ?Sized>(
    state: &AppState,
    resource: &R,
    request: &ResourceRequest,
) -> Option<String> {
    if !resource.options().throttle || state.throttle.is_exempt(&request.path) {
        return None;
    }
    let user = request
        .auth
        .as_ref()
        .filter(|_| state.throttle.per_user)
        .and_then(|a| a.identifier());
    Some(match user {
        Some(id) => format!("user:{id}"),
        None => format!(
            "ip:{}",
            request.remote_addr.as_deref().unwrap_or("unknown")
        ),
    })
}

pub async fn throttle_check<R: Resource + ?Sized>(
    state: &AppState,
    resource: &R,
    request: &ResourceRequest,
) -> Result<(), ApiError> {
    let Some(key) = throttle_identifier(state, resource, request) else {
        return Ok(());
    };
    if state.throttle.should_be_throttled(&key).await {
        warn!(resource = resource.name(), %key, "request throttled");
        return Err(ApiError::Throttled);
    }
    Ok(())
}

pub async fn log_throttled_access<R: Resource + ?Sized>(
    state: &AppState,
    resource: &R,
    request: &ResourceRequest,
) {
    if let Some(key) = throttle_identifier(state, resource, request) {
        state.throttle.accessed(&key).await;
    }
}

/// Serialize `data` as the JSON response body.
pub fn create_response(data: Value, status: StatusCode) -> Response {
    (status, Json(data)).into_response()
}

/// Synchronous dispatch: every resource's behaviour unless it overrides `dispatch`.
pub async fn default_dispatch<R: Resource + ?Sized>(
    resource: &R,
    state: &AppState,
    request_type: RequestType,
    mut request: ResourceRequest,
    kwargs: Kwargs,
) -> Result<Response, ApiError> {
    let method = method_check(&request, resource.options().allowed_for(request_type))?;
    let method_name = format!("{method}_{request_type}");

    is_authenticated(state, resource, &mut request).await?;
    throttle_check(state, resource, &request).await?;

    let outcome = resource.handle(&method_name, &request, &kwargs).await?;
    log_throttled_access(state, resource, &request).await;

    Ok(match outcome {
        None => StatusCode::NO_CONTENT.into_response(),
        Some(data) if method == "post" => create_response(data, StatusCode::CREATED),
        Some(data) => create_response(data, StatusCode::OK),
    })
}
