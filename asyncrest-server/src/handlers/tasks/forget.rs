use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use tracing::info;

use super::parse_task_id;
use crate::auth::authenticate;
use crate::{error::ApiError, state::AppState};

/// DELETE /tasks/{uuid}
/// Discard the stored state and result of a task.
pub async fn forget(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let auth = authenticate(&state, &headers, true).await?;

    let id = parse_task_id(&task_id)?;
    state.task_queue.async_result(id).forget().await?;
    info!(task_id = %id, user_id = ?auth.user_id, "task result forgotten");

    Ok(StatusCode::NO_CONTENT)
}
