//! Deferred dispatch: hand configured operations to the task queue.
//!
//! [`AsyncTaskResource`] wraps any [`Resource`] and overrides only its
//! `dispatch`. When the options name a task for `{method}_{request_type}`
//! (or a default task), the request is authenticated, throttled and then
//! submitted to the queue. The caller gets a task status body back unless the
//! task had already finished by the time it was checked, in which case the
//! ordinary synchronous response is produced instead.

use async_trait::async_trait;
use asyncrest_task_queue::{AsyncResult, TaskMeta, TaskRequest, TaskState};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::resource::dispatch::{
    create_response, default_dispatch, is_authenticated, log_throttled_access, method_check,
    throttle_check,
};
use crate::resource::{Kwargs, RequestType, Resource, ResourceOptions, ResourceRequest};
use crate::state::AppState;

/// Wire shape of a task that has not finished yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatusBody {
    pub uuid: String,
    pub status: String,
    pub result: Option<Value>,
    pub ready: bool,
    pub successful: bool,
    pub failed: bool,
}

impl TaskStatusBody {
    /// Build the body from a single backend record so all fields agree.
    pub fn from_meta(meta: &TaskMeta) -> Self {
        let ready = meta.status.is_ready();
        Self {
            uuid: meta.task_id.to_string(),
            status: meta.status.to_string(),
            result: if ready { meta.result.clone() } else { None },
            ready,
            successful: meta.status == TaskState::Success,
            failed: meta.status == TaskState::Failure,
        }
    }

    pub async fn fetch(handle: &AsyncResult) -> Result<Self, ApiError> {
        let meta = handle.meta().await?;
        Ok(Self::from_meta(&meta))
    }
}

/// Resource wrapper that defers configured operations to the task queue.
pub struct AsyncTaskResource<R> {
    inner: R,
}

impl<R: Resource> AsyncTaskResource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Task for `method_name`, falling back to the resource default.
    pub fn get_task(&self, method_name: &str) -> Option<&str> {
        self.inner.options().task_named(method_name)
    }
}

/// Everything a task needs to replay the request off the request path.
fn task_payload(
    resource: &str,
    request_type: RequestType,
    method: &str,
    request: &ResourceRequest,
    kwargs: &Kwargs,
) -> Value {
    json!({
        "resource": resource,
        "request_type": request_type.as_str(),
        "method": method,
        "kwargs": kwargs,
        "query": request.query,
        "body": request.body,
        "user_id": request.auth.as_ref().and_then(|a| a.identifier()),
    })
}

#[async_trait]
impl<R: Resource> Resource for AsyncTaskResource<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn options(&self) -> &ResourceOptions {
        self.inner.options()
    }

    async fn handle(
        &self,
        method_name: &str,
        request: &ResourceRequest,
        kwargs: &Kwargs,
    ) -> Result<Option<Value>, ApiError> {
        self.inner.handle(method_name, request, kwargs).await
    }

    async fn dispatch(
        &self,
        state: &AppState,
        request_type: RequestType,
        mut request: ResourceRequest,
        kwargs: Kwargs,
    ) -> Result<Response, ApiError> {
        let method = method_check(&request, self.options().allowed_for(request_type))?;
        let method_name = format!("{method}_{request_type}");

        let Some(task) = self.get_task(&method_name).map(str::to_owned) else {
            return default_dispatch(self, state, request_type, request, kwargs).await;
        };

        is_authenticated(state, self, &mut request).await?;
        throttle_check(state, self, &request).await?;
        log_throttled_access(state, self, &request).await;

        let payload = task_payload(self.name(), request_type, &method, &request, &kwargs);
        let handle = state
            .task_queue
            .delay(TaskRequest::new(task.clone(), payload))
            .await?;
        let meta = handle.meta().await?;
        info!(
            resource = self.name(),
            operation = %method_name,
            %task,
            task_id = %meta.task_id,
            status = %meta.status,
            "request deferred to task queue"
        );

        // A fast task may already be done; answer as if it never was deferred.
        if meta.status.is_ready() {
            return default_dispatch(self, state, request_type, request, kwargs).await;
        }

        let body = serde_json::to_value(TaskStatusBody::from_meta(&meta))?;
        Ok(create_response(body, StatusCode::OK))
    }
}
