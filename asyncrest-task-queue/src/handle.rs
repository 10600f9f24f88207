//! Client-side handle for polling a submitted task.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::backend::ResultBackend;
use crate::error::TaskQueueError;
use crate::types::{TaskMeta, TaskState};

/// Handle for the state and result of one task.
///
/// Every accessor is a fresh lookup against the result backend, so two calls
/// may observe different states while the task is running. A handle built
/// without an id cannot be queried and returns [`TaskQueueError::MissingTaskId`].
#[derive(Clone)]
pub struct AsyncResult {
    id: Option<Uuid>,
    backend: Arc<dyn ResultBackend>,
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("id", &self.id)
            .field("backend", &"<dyn ResultBackend>")
            .finish()
    }
}

impl AsyncResult {
    pub fn new(id: Option<Uuid>, backend: Arc<dyn ResultBackend>) -> Self {
        Self { id, backend }
    }

    #[inline]
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn require_id(&self) -> Result<Uuid, TaskQueueError> {
        self.id.ok_or(TaskQueueError::MissingTaskId)
    }

    /// Full backend record for this task.
    pub async fn meta(&self) -> Result<TaskMeta, TaskQueueError> {
        let id = self.require_id()?;
        self.backend.get_task_meta(id).await
    }

    pub async fn status(&self) -> Result<TaskState, TaskQueueError> {
        Ok(self.meta().await?.status)
    }

    /// The task's return value, or `None` while it has not finished.
    pub async fn result(&self) -> Result<Option<Value>, TaskQueueError> {
        let meta = self.meta().await?;
        if meta.status.is_ready() {
            Ok(meta.result)
        } else {
            Ok(None)
        }
    }

    pub async fn ready(&self) -> Result<bool, TaskQueueError> {
        Ok(self.status().await?.is_ready())
    }

    pub async fn successful(&self) -> Result<bool, TaskQueueError> {
        Ok(self.status().await? == TaskState::Success)
    }

    pub async fn failed(&self) -> Result<bool, TaskQueueError> {
        Ok(self.status().await? == TaskState::Failure)
    }

    /// Discard the stored state and result for this task.
    pub async fn forget(&self) -> Result<(), TaskQueueError> {
        let id = self.require_id()?;
        self.backend.forget(id).await
    }
}
