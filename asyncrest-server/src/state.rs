use std::sync::Arc;

use asyncrest_auth::AuthenticatorTrait;
use asyncrest_task_queue::TaskQueueClient;

use crate::rate_limiter::RateLimiterManager;
use crate::resource::ResourceRegistry;

/// Shared application state passed to every route handler.
#[derive(Clone)]
pub struct AppState {
    authenticator: Arc<dyn AuthenticatorTrait>,
    pub task_queue: TaskQueueClient,
    pub throttle: RateLimiterManager,
    pub resources: ResourceRegistry,
    allow_anonymous: bool,
}

impl AppState {
    pub fn new(
        authenticator: Arc<dyn AuthenticatorTrait>,
        task_queue: TaskQueueClient,
        throttle: RateLimiterManager,
        resources: ResourceRegistry,
    ) -> Self {
        Self {
            authenticator,
            task_queue,
            throttle,
            resources,
            allow_anonymous: false,
        }
    }

    /// Let requests without credentials through resources and task routes.
    pub fn with_anonymous_access(mut self, allow: bool) -> Self {
        self.allow_anonymous = allow;
        self
    }

    pub fn allows_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    pub fn authenticator(&self) -> Arc<dyn AuthenticatorTrait> {
        Arc::clone(&self.authenticator)
    }
}
