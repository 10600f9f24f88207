//! Error types for the task queue.

use thiserror::Error;

/// Errors that may occur while interacting with the task queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskQueueError {
    #[error("task handle has no task id")]
    MissingTaskId,

    #[error("task queue is unavailable")]
    Unavailable,

    #[error("task queue is full")]
    QueueFull,

    #[error("task is not registered: {0}")]
    NotRegistered(String),

    #[error("result backend error: {0}")]
    Backend(String),
}

/// Failure raised from inside a task body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
