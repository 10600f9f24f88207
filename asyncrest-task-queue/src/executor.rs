//! Task executor trait for implementing task bodies.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;

/// Trait for implementing task bodies.
///
/// Each task name the queue accepts has exactly one executor. The returned
/// value is stored as the task result on success.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Returns the task name this executor handles.
    fn name(&self) -> &str;

    /// Run the task with the submitted payload.
    async fn run(&self, payload: Value) -> Result<Value, TaskError>;
}

/// Executor that succeeds immediately and echoes its payload back as the result.
#[derive(Debug, Default, Clone)]
pub struct EchoExecutor {
    name: String,
}

impl EchoExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl TaskExecutor for EchoExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        Ok(payload)
    }
}
