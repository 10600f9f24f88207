//! Result backends: where task states and results are kept for polling.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TaskQueueError;
use crate::types::TaskMeta;

/// Default number of task records kept in memory.
pub const DEFAULT_MAX_RESULTS: usize = 1000;

/// Storage for task state, keyed by task id.
#[async_trait]
pub trait ResultBackend: Send + Sync {
    /// Look up a task. Unknown ids report `PENDING`.
    async fn get_task_meta(&self, id: Uuid) -> Result<TaskMeta, TaskQueueError>;

    /// Insert or replace the record for `meta.task_id`.
    async fn store(&self, meta: TaskMeta) -> Result<(), TaskQueueError>;

    /// Drop everything stored for a task.
    async fn forget(&self, id: Uuid) -> Result<(), TaskQueueError>;
}

#[derive(Debug, Default)]
struct ResultState {
    /// Insertion order, oldest first.
    order: VecDeque<Uuid>,
    metas: HashMap<Uuid, TaskMeta>,
}

impl ResultState {
    fn insert(&mut self, meta: TaskMeta, max: usize) {
        let id = meta.task_id;
        if self.metas.insert(id, meta).is_none() {
            self.order.push_back(id);
        }

        while self.order.len() > max {
            if let Some(old_id) = self.order.pop_front() {
                self.metas.remove(&old_id);
            }
        }
    }

    fn remove(&mut self, id: &Uuid) {
        if self.metas.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
        }
    }
}

/// Bounded in-memory result backend. The oldest records are evicted first.
pub struct InMemoryResultBackend {
    state: RwLock<ResultState>,
    max_results: usize,
}

impl fmt::Debug for InMemoryResultBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryResultBackend")
            .field("state", &"<RwLock<ResultState>>")
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl Default for InMemoryResultBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS)
    }
}

impl InMemoryResultBackend {
    pub fn new(max_results: usize) -> Self {
        Self {
            state: RwLock::new(ResultState::default()),
            max_results: max_results.max(1),
        }
    }

    /// Number of task records currently held.
    pub async fn len(&self) -> usize {
        self.state.read().await.metas.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ResultBackend for InMemoryResultBackend {
    async fn get_task_meta(&self, id: Uuid) -> Result<TaskMeta, TaskQueueError> {
        let state = self.state.read().await;
        Ok(state
            .metas
            .get(&id)
            .cloned()
            .unwrap_or_else(|| TaskMeta::pending(id)))
    }

    async fn store(&self, meta: TaskMeta) -> Result<(), TaskQueueError> {
        let mut state = self.state.write().await;
        state.insert(meta, self.max_results);
        Ok(())
    }

    async fn forget(&self, id: Uuid) -> Result<(), TaskQueueError> {
        let mut state = self.state.write().await;
        state.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskState;
    use serde_json::json;

    fn done(id: Uuid) -> TaskMeta {
        TaskMeta {
            task_id: id,
            task_name: Some("t".into()),
            status: TaskState::Success,
            result: Some(json!(1)),
            error: None,
            date_done: Some(chrono::Utc::now()),
        }
    }

    #[tokio::test]
    async fn unknown_id_is_pending() {
        let backend = InMemoryResultBackend::default();
        let id = Uuid::new_v4();
        let meta = backend.get_task_meta(id).await.unwrap();
        assert_eq!(meta.status, TaskState::Pending);
        assert!(meta.result.is_none());
    }

    #[tokio::test]
    async fn evicts_oldest_past_cap() {
        let backend = InMemoryResultBackend::new(2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            backend.store(done(*id)).await.unwrap();
        }
        assert_eq!(backend.len().await, 2);
        assert_eq!(
            backend.get_task_meta(ids[0]).await.unwrap().status,
            TaskState::Pending
        );
        assert_eq!(
            backend.get_task_meta(ids[2]).await.unwrap().status,
            TaskState::Success
        );
    }

    #[tokio::test]
    async fn restoring_same_id_does_not_grow_order() {
        let backend = InMemoryResultBackend::new(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        backend.store(TaskMeta::pending(a)).await.unwrap();
        backend.store(done(a)).await.unwrap();
        backend.store(done(b)).await.unwrap();
        assert_eq!(backend.len().await, 2);
        assert_eq!(
            backend.get_task_meta(a).await.unwrap().status,
            TaskState::Success
        );
    }

    #[tokio::test]
    async fn forget_removes_record() {
        let backend = InMemoryResultBackend::default();
        let id = Uuid::new_v4();
        backend.store(done(id)).await.unwrap();
        backend.forget(id).await.unwrap();
        let meta = backend.get_task_meta(id).await.unwrap();
        assert_eq!(meta.status, TaskState::Pending);
        assert!(meta.result.is_none());
        assert!(backend.is_empty().await);
    }
}
