use std::sync::Arc;

use asyncrest_auth::{AuthenticatorTrait, TestAuthenticator};
use asyncrest_server::bootstrap::build_state;
use asyncrest_server::build_router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::Builder;
use tower::util::ServiceExt;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let f = Builder::new().suffix(".toml").tempfile().expect("tmpfile");
    std::fs::write(f.path(), contents).expect("write config");
    f
}

fn authenticator() -> Arc<dyn AuthenticatorTrait> {
    Arc::new(TestAuthenticator::user(uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn configured_tasks_defer_matching_operations() {
    let f = write_config(
        r#"
[queue]
eager = false
capacity = 8

[resources.documents]
detail_allowed_methods = ["get", "delete"]

[resources.documents.tasks]
delete_detail = "documents.delete"
"#,
    );
    let config = asyncrest_config::load_config(Some(f.path())).expect("load");
    asyncrest_config::validate_config(&config).expect("valid");

    let (state, store) = build_state(&config, authenticator()).await.expect("state");
    store
        .create(json!({"id": "a", "title": "kept until the task runs"}))
        .unwrap();
    let queue = state.task_queue.clone();
    let app = build_router(Arc::new(state));

    // get_detail has no task and answers synchronously
    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/documents/a")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/documents/a")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["ready"], false);
    assert_eq!(store.len(), 1);

    assert!(queue.process_next().await);
    assert!(store.is_empty());

    // put is not in detail_allowed_methods
    let req = Request::builder()
        .method(Method::PUT)
        .uri("/api/documents/a")
        .body(Body::from(r#"{"title": "x"}"#))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn invalid_task_key_fails_validation() {
    let f = write_config(
        r#"
[resources.documents.tasks]
post_everything = "documents.create"
"#,
    );
    let config = asyncrest_config::load_config(Some(f.path())).expect("load");
    assert!(asyncrest_config::validate_config(&config).is_err());
}

#[tokio::test]
async fn ready_reports_registered_tasks() {
    let config = asyncrest_config::Config::default();
    let (state, _) = build_state(&config, authenticator()).await.expect("state");
    let app = build_router(Arc::new(state));

    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/ready")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

async fn call(app: &axum::Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn anonymous_mode_serves_requests_without_credentials() {
    let f = write_config(
        r#"
[auth]
allow_anonymous = true

[queue]
eager = false

[resources.documents.tasks]
post_list = "documents.create"
"#,
    );
    let config = asyncrest_config::load_config(Some(f.path())).expect("load");
    asyncrest_config::validate_config(&config).expect("valid");

    let auth: Arc<dyn AuthenticatorTrait> = Arc::new(asyncrest_auth::AllowAnonymousAuthenticator);
    let (state, store) = build_state(&config, auth).await.expect("state");
    let queue = state.task_queue.clone();
    let app = build_router(Arc::new(state));

    let (status, _) = call(&app, Method::GET, "/api/documents", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, pending) = call(
        &app,
        Method::POST,
        "/api/documents",
        Some(json!({"id": "a", "title": "anonymous draft"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["status"], "PENDING");
    let task_uri = format!("/api/tasks/{}", pending["uuid"].as_str().unwrap());

    assert!(queue.process_next().await);
    assert_eq!(store.len(), 1);

    let (status, polled) = call(&app, Method::GET, &task_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(polled["status"], "SUCCESS");

    let (status, _) = call(&app, Method::DELETE, &task_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn credentials_stay_required_without_anonymous_mode() {
    let config = asyncrest_config::Config::default();
    let auth: Arc<dyn AuthenticatorTrait> = Arc::new(asyncrest_auth::AllowAnonymousAuthenticator);
    let (state, _) = build_state(&config, auth).await.expect("state");
    let app = build_router(Arc::new(state));

    let (status, _) = call(&app, Method::GET, "/api/documents", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let uri = format!("/api/tasks/{}", uuid::Uuid::new_v4());
    let (status, _) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
