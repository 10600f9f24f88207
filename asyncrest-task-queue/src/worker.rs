//! Worker loop that drains the transport and records outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::backend::ResultBackend;
use crate::executor::TaskExecutor;
use crate::types::{TaskMessage, TaskMeta, TaskState};

pub(crate) type ExecutorMap = Arc<RwLock<HashMap<String, Arc<dyn TaskExecutor>>>>;

/// Run one message to completion, storing `STARTED` and then the final state.
pub(crate) async fn execute_message(
    message: TaskMessage,
    executors: &ExecutorMap,
    backend: &Arc<dyn ResultBackend>,
) {
    let TaskMessage { id, request } = message;
    let task_name = request.task_name;

    let executor = {
        let executors = executors.read().await;
        executors.get(&task_name).cloned()
    };

    let record = |status: TaskState, result: Option<Value>, error: Option<String>| TaskMeta {
        task_id: id,
        task_name: Some(task_name.clone()),
        status,
        result,
        error,
        date_done: status.is_ready().then(chrono::Utc::now),
    };

    let Some(executor) = executor else {
        let message = format!("task is not registered: {task_name}");
        warn!(task_id = %id, task = %task_name, "received unregistered task");
        store(backend, record(TaskState::Failure, Some(Value::String(message.clone())), Some(message))).await;
        return;
    };

    store(backend, record(TaskState::Started, None, None)).await;
    debug!(task_id = %id, task = %task_name, "task started");

    match executor.run(request.payload).await {
        Ok(value) => {
            debug!(task_id = %id, task = %task_name, "task succeeded");
            store(backend, record(TaskState::Success, Some(value), None)).await;
        }
        Err(e) => {
            warn!(task_id = %id, task = %task_name, error = %e, "task failed");
            let message = e.to_string();
            store(
                backend,
                record(TaskState::Failure, Some(Value::String(message.clone())), Some(message)),
            )
            .await;
        }
    }
}

async fn store(backend: &Arc<dyn ResultBackend>, meta: TaskMeta) {
    let id = meta.task_id;
    if let Err(e) = backend.store(meta).await {
        warn!(task_id = %id, error = %e, "failed to store task state");
    }
}

/// Pull messages until every sender is dropped.
pub(crate) async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TaskMessage>>>,
    executors: ExecutorMap,
    backend: Arc<dyn ResultBackend>,
) {
    debug!(worker_id, "task worker started");
    loop {
        let next = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };
        match next {
            Some(message) => execute_message(message, &executors, &backend).await,
            None => break,
        }
    }
    debug!(worker_id, "task worker stopped");
}
