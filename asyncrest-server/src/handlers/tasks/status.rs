use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::Json;

use super::parse_task_id;
use crate::async_task::TaskStatusBody;
use crate::auth::authenticate;
use crate::{error::ApiError, state::AppState};

/// GET /tasks/{uuid}
/// Poll the state of a deferred request. Unknown ids report PENDING.
pub async fn status(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusBody>, ApiError> {
    authenticate(&state, &headers, true).await?;

    let id = parse_task_id(&task_id)?;
    let handle = state.task_queue.async_result(id);
    Ok(Json(TaskStatusBody::fetch(&handle).await?))
}
