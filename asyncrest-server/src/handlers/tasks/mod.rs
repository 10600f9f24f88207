mod forget;
mod status;

pub use forget::forget;
pub use status::status;

use uuid::Uuid;

use crate::error::ApiError;

fn parse_task_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid task id: {raw}")))
}
