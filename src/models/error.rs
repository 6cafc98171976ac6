use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body returned by REST endpoints on failure
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status code
    pub code: u16,
    pub status: String,
    pub error: String,
}
