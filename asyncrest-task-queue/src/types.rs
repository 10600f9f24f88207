//! Core types for the task queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A unit of work submitted to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_name: String,
    pub payload: Value,
}

impl TaskRequest {
    #[inline]
    pub fn new(task_name: impl Into<String>, payload: Value) -> Self {
        Self {
            task_name: task_name.into(),
            payload,
        }
    }
}

/// Message carried from `delay` to the workers.
#[derive(Debug, Clone)]
pub(crate) struct TaskMessage {
    pub id: Uuid,
    pub request: TaskRequest,
}

/// Lifecycle state of a task as seen by the result backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Received,
    Started,
    Success,
    Failure,
    Retry,
    Revoked,
}

impl TaskState {
    /// Returns true once the task will not change state again.
    #[inline]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Revoked)
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Received => "RECEIVED",
            Self::Started => "STARTED",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Retry => "RETRY",
            Self::Revoked => "REVOKED",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the result backend knows about one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskMeta {
    pub task_id: Uuid,
    pub task_name: Option<String>,
    pub status: TaskState,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub date_done: Option<DateTime<Utc>>,
}

impl TaskMeta {
    /// Metadata reported for an id the backend holds nothing for.
    #[inline]
    pub fn pending(task_id: Uuid) -> Self {
        Self {
            task_id,
            task_name: None,
            status: TaskState::Pending,
            result: None,
            error: None,
            date_done: None,
        }
    }
}
