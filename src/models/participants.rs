use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ActiveParticipant;

/// Live participants of one document
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsResponse {
    pub document_id: String,
    pub revision: u64,
    pub active_users: Vec<ActiveParticipant>,
}
