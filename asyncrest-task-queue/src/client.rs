//! Task queue client: submission, lookup and worker management.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{InMemoryResultBackend, ResultBackend};
use crate::error::TaskQueueError;
use crate::executor::TaskExecutor;
use crate::handle::AsyncResult;
use crate::types::{TaskMessage, TaskMeta, TaskRequest};
use crate::worker::{execute_message, run_worker, ExecutorMap};

/// Default number of messages the transport buffers before `delay` reports a full queue.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Interface for submitting tasks and polling their results.
#[derive(Clone)]
pub struct TaskQueueClient {
    backend: Arc<dyn ResultBackend>,
    executors: ExecutorMap,
    sender: mpsc::Sender<TaskMessage>,
    receiver: Arc<Mutex<mpsc::Receiver<TaskMessage>>>,
    eager: bool,
}

impl fmt::Debug for TaskQueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueueClient")
            .field("backend", &"<dyn ResultBackend>")
            .field(
                "executors",
                &"<RwLock<HashMap<String, Arc<dyn TaskExecutor>>>>",
            )
            .field("eager", &self.eager)
            .finish()
    }
}

impl Default for TaskQueueClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueueClient {
    pub fn new() -> Self {
        Self::with_backend(DEFAULT_CAPACITY, Arc::new(InMemoryResultBackend::default()))
    }

    /// Build a client over a specific result backend with a bounded transport.
    pub fn with_backend(capacity: usize, backend: Arc<dyn ResultBackend>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            backend,
            executors: Arc::new(RwLock::new(HashMap::new())),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            eager: false,
        }
    }

    /// Run tasks inline inside `delay` instead of handing them to workers.
    #[must_use]
    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    #[inline]
    pub fn is_eager(&self) -> bool {
        self.eager
    }

    #[inline]
    pub fn backend(&self) -> Arc<dyn ResultBackend> {
        Arc::clone(&self.backend)
    }

    /// Register an executor under its task name, replacing any previous one.
    pub async fn register_task<E: TaskExecutor + 'static>(&self, executor: E) {
        let name = executor.name().to_owned();
        let mut executors = self.executors.write().await;
        executors.insert(name, Arc::new(executor));
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.executors.read().await.contains_key(name)
    }

    /// Registered task names, sorted.
    pub async fn task_names(&self) -> Vec<String> {
        let executors = self.executors.read().await;
        let mut names: Vec<String> = executors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Submit a task and return its handle without waiting for it to run.
    pub async fn delay(&self, request: TaskRequest) -> Result<AsyncResult, TaskQueueError> {
        if !self.is_registered(&request.task_name).await {
            return Err(TaskQueueError::NotRegistered(request.task_name));
        }

        let id = Uuid::new_v4();
        let mut meta = TaskMeta::pending(id);
        meta.task_name = Some(request.task_name.clone());
        self.backend.store(meta).await?;

        let task_name = request.task_name.clone();
        let message = TaskMessage { id, request };

        if self.eager {
            execute_message(message, &self.executors, &self.backend).await;
        } else if let Err(e) = self.sender.try_send(message) {
            self.backend.forget(id).await?;
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => TaskQueueError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TaskQueueError::Unavailable,
            });
        }

        debug!(task_id = %id, task = %task_name, eager = self.eager, "task submitted");
        Ok(self.async_result(id))
    }

    /// Handle for an already submitted task.
    #[inline]
    pub fn async_result(&self, id: Uuid) -> AsyncResult {
        AsyncResult::new(Some(id), self.backend())
    }

    /// Run at most one queued message on the current task. Returns whether one ran.
    ///
    /// Never waits: while workers started with [`start_workers`](Self::start_workers)
    /// hold the receiver this returns `false` and leaves the queue to them.
    pub async fn process_next(&self) -> bool {
        let next = match self.receiver.try_lock() {
            Ok(mut rx) => rx.try_recv().ok(),
            Err(_) => None,
        };
        match next {
            Some(message) => {
                execute_message(message, &self.executors, &self.backend).await;
                true
            }
            None => false,
        }
    }

    /// Spawn `count` workers that share the transport.
    pub fn start_workers(&self, count: usize) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&self.receiver),
                    Arc::clone(&self.executors),
                    self.backend(),
                ))
            })
            .collect()
    }
}
