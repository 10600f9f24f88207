//! In-process task queue with a pollable result backend.
//!
//! Work is submitted with [`TaskQueueClient::delay`], which returns at once with
//! an [`AsyncResult`] handle. Workers started with
//! [`TaskQueueClient::start_workers`] pull submissions off a bounded channel,
//! run the matching [`TaskExecutor`] and write the outcome to the
//! [`ResultBackend`], where the handle reads it back.
//!
//! # Example
//!
//! ```rust,no_run
//! use asyncrest_task_queue::{EchoExecutor, TaskQueueClient, TaskRequest};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = TaskQueueClient::new();
//!     client.register_task(EchoExecutor::new("echo")).await;
//!     client.start_workers(2);
//!
//!     let handle = client.delay(TaskRequest::new("echo", json!({"k": "v"}))).await.unwrap();
//!     println!("submitted {:?}: {}", handle.id(), handle.status().await.unwrap());
//! }
//! ```

mod backend;
mod client;
mod error;
mod executor;
mod handle;
mod types;
mod worker;

pub use backend::{InMemoryResultBackend, ResultBackend, DEFAULT_MAX_RESULTS};
pub use client::{TaskQueueClient, DEFAULT_CAPACITY};
pub use error::{TaskError, TaskQueueError};
pub use executor::{EchoExecutor, TaskExecutor};
pub use handle::AsyncResult;
pub use types::{TaskMeta, TaskRequest, TaskState};

// Re-export async_trait for convenience when implementing TaskExecutor
pub use async_trait::async_trait;
