//! Assemble application state from configuration.

use std::sync::Arc;

use asyncrest_auth::AuthenticatorTrait;
use asyncrest_config::{Config, QueueConfig, ThrottleConfig};
use asyncrest_task_queue::{InMemoryResultBackend, TaskQueueClient};
use tracing::{info, warn};

use crate::async_task::AsyncTaskResource;
use crate::documents::{register_document_tasks, DocumentResource, DocumentStore, DOCUMENTS_RESOURCE};
use crate::error::ApiError;
use crate::rate_limiter::RateLimiterManager;
use crate::resource::{ResourceOptions, ResourceRegistry};
use crate::state::AppState;

/// Task queue over an in-memory result backend sized from config. Workers are not started.
pub fn build_task_queue(cfg: &QueueConfig) -> TaskQueueClient {
    let backend = Arc::new(InMemoryResultBackend::new(cfg.max_results));
    TaskQueueClient::with_backend(cfg.capacity, backend).eager(cfg.eager)
}

pub fn build_throttle(cfg: &ThrottleConfig) -> RateLimiterManager {
    RateLimiterManager::from_config(
        cfg.enabled,
        cfg.per_user,
        cfg.rate_per_sec,
        cfg.burst,
        cfg.exempt_paths.clone(),
    )
}

/// Build the shared state and the document store behind the `documents` resource.
///
/// Fails when configuration names a resource that does not exist or a task
/// no executor is registered for.
pub async fn build_state(
    config: &Config,
    authenticator: Arc<dyn AuthenticatorTrait>,
) -> Result<(AppState, DocumentStore), ApiError> {
    let task_queue = build_task_queue(&config.queue);
    let store = DocumentStore::new();
    register_document_tasks(&task_queue, &store).await;

    let options = config
        .resources
        .get(DOCUMENTS_RESOURCE)
        .map(ResourceOptions::from_config)
        .unwrap_or_default();
    let documents = AsyncTaskResource::new(DocumentResource::new(options, store.clone()));
    let resources = ResourceRegistry::new().register(Arc::new(documents))?;

    for name in config.resources.keys() {
        if resources.get(name).is_none() {
            return Err(ApiError::Unexpected(format!(
                "configuration names unknown resource {name}"
            )));
        }
    }
    for resource in resources.iter() {
        for task in resource.options().task_names() {
            if !task_queue.is_registered(task).await {
                return Err(ApiError::Unexpected(format!(
                    "resource {} defers to unregistered task {task}",
                    resource.name()
                )));
            }
        }
    }

    if config.queue.eager {
        warn!("task queue is eager: deferred tasks run inside the request");
    }
    info!(
        resources = ?resources.names(),
        tasks = ?task_queue.task_names().await,
        "resources registered"
    );

    let state = AppState::new(
        authenticator,
        task_queue,
        build_throttle(&config.throttle),
        resources,
    )
    .with_anonymous_access(config.auth.anonymous_mode());
    if state.allows_anonymous() {
        warn!("anonymous access enabled; requests without credentials are accepted");
    }
    Ok((state, store))
}
