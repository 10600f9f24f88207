use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Extension, Path};
use axum::http::Request;
use axum::response::Response;

use crate::error::ApiError;
use crate::resource::{Kwargs, RequestType, ResourceRequest};
use crate::state::AppState;

/// ANY /{resource}
pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    Path(resource): Path<String>,
    req: Request<Body>,
) -> Result<Response, ApiError> {
    dispatch(&state, &resource, RequestType::List, Kwargs::new(), req).await
}

/// ANY /{resource}/{pk}
pub async fn detail(
    Extension(state): Extension<Arc<AppState>>,
    Path((resource, pk)): Path<(String, String)>,
    req: Request<Body>,
) -> Result<Response, ApiError> {
    let mut kwargs = Kwargs::new();
    kwargs.insert("pk".into(), pk);
    dispatch(&state, &resource, RequestType::Detail, kwargs, req).await
}

async fn dispatch(
    state: &AppState,
    name: &str,
    request_type: RequestType,
    kwargs: Kwargs,
    req: Request<Body>,
) -> Result<Response, ApiError> {
    let resource = state
        .resources
        .get(name)
        .ok_or_else(|| ApiError::not_found(format!("no resource named {name}")))?;
    let request = ResourceRequest::from_http(req).await?;
    resource.dispatch(state, request_type, request, kwargs).await
}
