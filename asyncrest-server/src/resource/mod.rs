//! REST resources: the request model, the [`Resource`] trait and its registry.
//!
//! A resource answers two request types, `list` (`/{resource}`) and `detail`
//! (`/{resource}/{pk}`). The HTTP method selects the operation, so a request
//! is routed to the handler named `{method}_{request_type}`, e.g.
//! `post_list` to create or `put_detail` to update.

pub mod dispatch;
pub mod options;

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use asyncrest_auth::AuthContext;
use axum::body::Body;
use axum::extract::{ConnectInfo, Query};
use axum::http::{HeaderMap, Method, Request};
use axum::response::Response;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

pub use options::ResourceOptions;

/// Largest request body a resource will read.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Names that cannot be used for resources because fixed routes own them.
pub const RESERVED_NAMES: &[&str] = &["tasks", "health", "ready"];

/// Routing parameters captured from the URL, e.g. `pk`.
pub type Kwargs = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    List,
    Detail,
}

impl RequestType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Detail => "detail",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound request as seen by a resource.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub body: Value,
    pub remote_addr: Option<String>,
    /// Filled in once authentication has run.
    pub auth: Option<AuthContext>,
}

impl ResourceRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            body: Value::Null,
            remote_addr: None,
            auth: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Lower-cased HTTP method, e.g. `post`.
    pub fn method_name(&self) -> String {
        self.method.as_str().to_ascii_lowercase()
    }

    /// Read an axum request into a resource request. An empty body becomes `null`.
    pub async fn from_http(req: Request<Body>) -> Result<Self, ApiError> {
        let (parts, body) = req.into_parts();

        let query = if parts.uri.query().is_some() {
            Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
                .map(|Query(q)| q)
                .map_err(|e| ApiError::bad_request(format!("invalid query string: {e}")))?
        } else {
            HashMap::new()
        };

        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read body: {e}")))?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        let remote_addr = remote_addr_key(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            query,
            body,
            remote_addr,
            auth: None,
        })
    }
}

fn remote_addr_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|first| first.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A REST resource.
///
/// Implementors provide `handle`; `dispatch` is the entry point the router
/// calls and defaults to [`dispatch::default_dispatch`].
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// URL segment the resource is mounted under.
    fn name(&self) -> &str;

    fn options(&self) -> &ResourceOptions;

    /// Run the handler named `{method}_{request_type}`.
    ///
    /// `Ok(None)` becomes `204 No Content`.
    async fn handle(
        &self,
        method_name: &str,
        _request: &ResourceRequest,
        _kwargs: &Kwargs,
    ) -> Result<Option<Value>, ApiError> {
        Err(ApiError::not_implemented(method_name))
    }

    async fn dispatch(
        &self,
        state: &AppState,
        request_type: RequestType,
        request: ResourceRequest,
        kwargs: Kwargs,
    ) -> Result<Response, ApiError> {
        dispatch::default_dispatch(self, state, request_type, request, kwargs).await
    }
}

/// Name-indexed set of mounted resources.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    resources: Arc<HashMap<String, Arc<dyn Resource>>>,
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resources", &self.names())
            .finish()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a resource under its name. Reserved or duplicate names are rejected.
    pub fn register(mut self, resource: Arc<dyn Resource>) -> Result<Self, ApiError> {
        let name = resource.name().to_string();
        if name.is_empty() || name.contains('/') || RESERVED_NAMES.contains(&name.as_str()) {
            return Err(ApiError::Unexpected(format!(
                "invalid resource name: {name:?}"
            )));
        }
        let resources = Arc::make_mut(&mut self.resources);
        if resources.contains_key(&name) {
            return Err(ApiError::Unexpected(format!(
                "resource {name} is already registered"
            )));
        }
        resources.insert(name, resource);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Resource>> {
        self.resources.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Resource>> {
        self.resources.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Bare(ResourceOptions);

    #[async_trait]
    impl Resource for Bare {
        fn name(&self) -> &str {
            "bare"
        }

        fn options(&self) -> &ResourceOptions {
            &self.0
        }
    }

    struct Named(&'static str, ResourceOptions);

    #[async_trait]
    impl Resource for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn options(&self) -> &ResourceOptions {
            &self.1
        }
    }

    #[test]
    fn registry_rejects_reserved_and_duplicates() {
        let registry = ResourceRegistry::new()
            .register(Arc::new(Bare(ResourceOptions::new())))
            .unwrap();
        assert!(registry
            .clone()
            .register(Arc::new(Bare(ResourceOptions::new())))
            .is_err());
        assert!(registry
            .clone()
            .register(Arc::new(Named("tasks", ResourceOptions::new())))
            .is_err());
        assert_eq!(registry.names(), ["bare"]);
    }

    #[tokio::test]
    async fn from_http_parses_query_and_body() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/documents?limit=5")
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::from(r#"{"id":"a"}"#))
            .unwrap();
        let r = ResourceRequest::from_http(req).await.unwrap();
        assert_eq!(r.method_name(), "post");
        assert_eq!(r.query.get("limit").map(String::as_str), Some("5"));
        assert_eq!(r.body, json!({"id": "a"}));
        assert_eq!(r.remote_addr.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn from_http_empty_body_is_null() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/documents")
            .body(Body::empty())
            .unwrap();
        let r = ResourceRequest::from_http(req).await.unwrap();
        assert_eq!(r.body, Value::Null);
        assert!(r.query.is_empty());
    }
}
