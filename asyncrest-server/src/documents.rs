//! In-memory JSON document collection and the tasks that mutate it.

use std::sync::Arc;

use async_trait::async_trait;
use asyncrest_task_queue::{TaskError, TaskExecutor, TaskQueueClient};
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::error::ApiError;
use crate::resource::{Kwargs, Resource, ResourceOptions, ResourceRequest};

pub const DOCUMENTS_RESOURCE: &str = "documents";

pub const CREATE_TASK: &str = "documents.create";
pub const UPDATE_TASK: &str = "documents.update";
pub const DELETE_TASK: &str = "documents.delete";

/// Page size used by `get_list` when the request gives no `limit`.
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document body must be a JSON object")]
    NotAnObject,
    #[error("document body needs a string \"id\" field")]
    MissingId,
    #[error("document {0} not found")]
    NotFound(String),
    #[error("task payload is missing {0}")]
    MalformedPayload(&'static str),
}

impl From<DocumentError> for ApiError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::NotFound(_) => ApiError::not_found(e.to_string()),
            _ => ApiError::bad_request(e.to_string()),
        }
    }
}

impl From<DocumentError> for TaskError {
    fn from(e: DocumentError) -> Self {
        TaskError::new(e.to_string())
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>, DocumentError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(DocumentError::NotAnObject),
    }
}

/// Documents keyed by their `id` field.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: Arc<DashMap<String, Value>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `body` under its `id`, replacing any document already there.
    pub fn create(&self, body: Value) -> Result<Value, DocumentError> {
        let map = into_object(body)?;
        let id = match map.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => return Err(DocumentError::MissingId),
        };
        let doc = Value::Object(map);
        self.docs.insert(id, doc.clone());
        Ok(doc)
    }

    /// Replace the document at `pk`, creating it when absent. `pk` wins over any body `id`.
    pub fn replace(&self, pk: &str, body: Value) -> Result<Value, DocumentError> {
        let mut map = into_object(body)?;
        map.insert("id".into(), Value::String(pk.to_string()));
        let doc = Value::Object(map);
        self.docs.insert(pk.to_string(), doc.clone());
        Ok(doc)
    }

    /// Shallow-merge `body` into the existing document.
    pub fn patch(&self, pk: &str, body: Value) -> Result<Value, DocumentError> {
        let patch = into_object(body)?;
        let mut entry = self
            .docs
            .get_mut(pk)
            .ok_or_else(|| DocumentError::NotFound(pk.to_string()))?;
        if let Value::Object(existing) = entry.value_mut() {
            for (k, v) in patch {
                if k != "id" {
                    existing.insert(k, v);
                }
            }
        }
        Ok(entry.value().clone())
    }

    /// Remove `pk`. Returns whether a document was there.
    pub fn delete(&self, pk: &str) -> bool {
        self.docs.remove(pk).is_some()
    }

    pub fn get(&self, pk: &str) -> Option<Value> {
        self.docs.get(pk).map(|d| d.value().clone())
    }

    /// All documents ordered by id.
    pub fn list(&self) -> Vec<Value> {
        let mut entries: Vec<(String, Value)> = self
            .docs
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, v)| v).collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

fn require_pk(kwargs: &Kwargs) -> Result<&str, ApiError> {
    kwargs
        .get("pk")
        .map(String::as_str)
        .ok_or_else(|| ApiError::bad_request("missing document id"))
}

fn query_usize(request: &ResourceRequest, key: &str, default: usize) -> Result<usize, ApiError> {
    match request.query.get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("{key} must be a non-negative integer"))),
        None => Ok(default),
    }
}

/// REST resource over a [`DocumentStore`].
pub struct DocumentResource {
    options: ResourceOptions,
    store: DocumentStore,
}

impl DocumentResource {
    pub fn new(options: ResourceOptions, store: DocumentStore) -> Self {
        Self { options, store }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    fn get_list(&self, request: &ResourceRequest) -> Result<Value, ApiError> {
        let limit = query_usize(request, "limit", DEFAULT_PAGE_SIZE)?;
        let offset = query_usize(request, "offset", 0)?;
        let all = self.store.list();
        let total_count = all.len();
        let objects: Vec<Value> = all.into_iter().skip(offset).take(limit).collect();
        Ok(json!({
            "meta": { "limit": limit, "offset": offset, "total_count": total_count },
            "objects": objects,
        }))
    }
}

#[async_trait]
impl Resource for DocumentResource {
    fn name(&self) -> &str {
        DOCUMENTS_RESOURCE
    }

    fn options(&self) -> &ResourceOptions {
        &self.options
    }

    async fn handle(
        &self,
        method_name: &str,
        request: &ResourceRequest,
        kwargs: &Kwargs,
    ) -> Result<Option<Value>, ApiError> {
        debug!(operation = method_name, "document operation");
        match method_name {
            "get_list" => self.get_list(request).map(Some),
            "post_list" => Ok(Some(self.store.create(request.body.clone())?)),
            "get_detail" => {
                let pk = require_pk(kwargs)?;
                self.store
                    .get(pk)
                    .map(Some)
                    .ok_or_else(|| DocumentError::NotFound(pk.to_string()).into())
            }
            "put_detail" => {
                let pk = require_pk(kwargs)?;
                Ok(Some(self.store.replace(pk, request.body.clone())?))
            }
            "patch_detail" => {
                let pk = require_pk(kwargs)?;
                Ok(Some(self.store.patch(pk, request.body.clone())?))
            }
            "delete_detail" => {
                // A deferred delete may already have run; both outcomes answer 204.
                self.store.delete(require_pk(kwargs)?);
                Ok(None)
            }
            other => Err(ApiError::not_implemented(other)),
        }
    }
}

fn payload_body(payload: &Value) -> Value {
    payload.get("body").cloned().unwrap_or(Value::Null)
}

fn payload_pk(payload: &Value) -> Result<&str, DocumentError> {
    payload
        .pointer("/kwargs/pk")
        .and_then(Value::as_str)
        .ok_or(DocumentError::MalformedPayload("kwargs.pk"))
}

/// Runs `post_list` off the request path.
pub struct DocumentCreateTask {
    store: DocumentStore,
}

#[async_trait]
impl TaskExecutor for DocumentCreateTask {
    fn name(&self) -> &str {
        CREATE_TASK
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        Ok(self.store.create(payload_body(&payload))?)
    }
}

/// Runs `put_detail` and `patch_detail` off the request path.
pub struct DocumentUpdateTask {
    store: DocumentStore,
}

#[async_trait]
impl TaskExecutor for DocumentUpdateTask {
    fn name(&self) -> &str {
        UPDATE_TASK
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        let pk = payload_pk(&payload)?;
        let body = payload_body(&payload);
        let doc = match payload.get("method").and_then(Value::as_str) {
            Some("patch") => self.store.patch(pk, body)?,
            _ => self.store.replace(pk, body)?,
        };
        Ok(doc)
    }
}

/// Runs `delete_detail` off the request path.
pub struct DocumentDeleteTask {
    store: DocumentStore,
}

#[async_trait]
impl TaskExecutor for DocumentDeleteTask {
    fn name(&self) -> &str {
        DELETE_TASK
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        let pk = payload_pk(&payload)?;
        let deleted = self.store.delete(pk);
        Ok(json!({ "id": pk, "deleted": deleted }))
    }
}

/// Register the three document tasks against `store`.
pub async fn register_document_tasks(client: &TaskQueueClient, store: &DocumentStore) {
    client
        .register_task(DocumentCreateTask {
            store: store.clone(),
        })
        .await;
    client
        .register_task(DocumentUpdateTask {
            store: store.clone(),
        })
        .await;
    client
        .register_task(DocumentDeleteTask {
            store: store.clone(),
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};

    fn doc(id: &str, title: &str) -> Value {
        json!({ "id": id, "title": title })
    }

    #[test]
    fn create_requires_object_with_id() {
        let store = DocumentStore::new();
        assert_eq!(store.create(json!([1])), Err(DocumentError::NotAnObject));
        assert_eq!(
            store.create(json!({"title": "x"})),
            Err(DocumentError::MissingId)
        );
        assert_eq!(store.create(json!({"id": ""})), Err(DocumentError::MissingId));
        assert!(store.is_empty());
    }

    #[test]
    fn create_is_an_upsert() {
        let store = DocumentStore::new();
        store.create(doc("a", "first")).unwrap();
        store.create(doc("a", "second")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap()["title"], "second");
    }

    #[test]
    fn patch_merges_and_keeps_id() {
        let store = DocumentStore::new();
        store.create(doc("a", "first")).unwrap();
        let patched = store
            .patch("a", json!({"id": "b", "tags": ["x"]}))
            .unwrap();
        assert_eq!(patched, json!({"id": "a", "title": "first", "tags": ["x"]}));
        assert_eq!(
            store.patch("missing", json!({})),
            Err(DocumentError::NotFound("missing".into()))
        );
    }

    #[test]
    fn list_is_sorted_by_id() {
        let store = DocumentStore::new();
        store.create(doc("b", "2")).unwrap();
        store.create(doc("a", "1")).unwrap();
        let ids: Vec<Value> = store.list().into_iter().map(|d| d["id"].clone()).collect();
        assert_eq!(ids, [json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn handlers_cover_list_and_detail() {
        let resource = DocumentResource::new(ResourceOptions::new(), DocumentStore::new());
        let mut kwargs = Kwargs::new();

        let created = resource
            .handle(
                "post_list",
                &ResourceRequest::new(Method::POST, "/documents").with_body(doc("a", "x")),
                &kwargs,
            )
            .await
            .unwrap();
        assert_eq!(created, Some(doc("a", "x")));

        let mut list_req = ResourceRequest::new(Method::GET, "/documents");
        list_req.query.insert("limit".into(), "1".into());
        let list = resource
            .handle("get_list", &list_req, &kwargs)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(list["meta"]["total_count"], 1);
        assert_eq!(list["meta"]["limit"], 1);
        assert_eq!(list["objects"][0]["id"], "a");

        kwargs.insert("pk".into(), "a".into());
        let replaced = resource
            .handle(
                "put_detail",
                &ResourceRequest::new(Method::PUT, "/documents/a")
                    .with_body(json!({"title": "y"})),
                &kwargs,
            )
            .await
            .unwrap();
        assert_eq!(replaced, Some(doc("a", "y")));

        let deleted = resource
            .handle(
                "delete_detail",
                &ResourceRequest::new(Method::DELETE, "/documents/a"),
                &kwargs,
            )
            .await
            .unwrap();
        assert_eq!(deleted, None);

        let err = resource
            .handle(
                "get_detail",
                &ResourceRequest::new(Method::GET, "/documents/a"),
                &kwargs,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_pagination_is_rejected() {
        let resource = DocumentResource::new(ResourceOptions::new(), DocumentStore::new());
        let mut req = ResourceRequest::new(Method::GET, "/documents");
        req.query.insert("offset".into(), "-1".into());
        let err = resource
            .handle("get_list", &req, &Kwargs::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tasks_apply_the_same_mutations() {
        let store = DocumentStore::new();
        let create = DocumentCreateTask {
            store: store.clone(),
        };
        let update = DocumentUpdateTask {
            store: store.clone(),
        };
        let delete = DocumentDeleteTask {
            store: store.clone(),
        };

        create
            .run(json!({"method": "post", "kwargs": {}, "body": doc("a", "x")}))
            .await
            .unwrap();
        update
            .run(json!({"method": "patch", "kwargs": {"pk": "a"}, "body": {"n": 1}}))
            .await
            .unwrap();
        assert_eq!(store.get("a").unwrap(), json!({"id": "a", "title": "x", "n": 1}));

        let out = delete
            .run(json!({"method": "delete", "kwargs": {"pk": "a"}, "body": null}))
            .await
            .unwrap();
        assert_eq!(out, json!({"id": "a", "deleted": true}));
        assert!(store.is_empty());

        let err = update
            .run(json!({"method": "put", "kwargs": {}, "body": {}}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "task payload is missing kwargs.pk");
    }

    #[tokio::test]
    async fn registration_names() {
        let client = TaskQueueClient::new();
        register_document_tasks(&client, &DocumentStore::new()).await;
        assert_eq!(
            client.task_names().await,
            [CREATE_TASK, DELETE_TASK, UPDATE_TASK]
        );
    }
}
