pub mod app;
pub mod async_task;
pub mod auth;
pub mod bootstrap;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod rate_limiter;
pub mod resource;
pub mod state;

pub use app::build_router;
