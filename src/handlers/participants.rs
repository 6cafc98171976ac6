use crate::{models::{ErrorResponse, ParticipantsResponse}, AppState};
use axum::{extract::{Path, State}, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{debug, error};

/// List the live participants of a document
pub async fn doc_participants(
    State(app_state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<(StatusCode, Json<ParticipantsResponse>), (StatusCode, Json<ErrorResponse>)> {

    if document_id.trim().is_empty() {
        error!("Empty document ID provided");
        let status = StatusCode::BAD_REQUEST;
        return Err((
            status,
            Json(ErrorResponse {
                code: status.as_u16(),
                status: status.to_string(),
                error: "Document ID cannot be empty".to_string(),
            }),
        ));
    }

    let active_users = app_state.hub.list_active(&document_id).await;
    let revision = app_state.hub.revision(&document_id).await;
    debug!("Document '{}' has {} participant(s) at revision {}", document_id, active_users.len(), revision);

    Ok((
        StatusCode::OK,
        Json(ParticipantsResponse {
            document_id,
            revision,
            active_users,
        }),
    ))
}
