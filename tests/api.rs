//! REST surface tests, driven through the router without a socket.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use colabri_live::{
    config::Config,
    create_app,
    models::{CollaborationMessage, JoinDocument, MessageKind},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_and_ready() {
    let state = Arc::new(AppState::new(Config::default()));

    let (status, body) = get_json(create_app(state.clone()), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "colabri-live is running");

    let (status, body) = get_json(create_app(state), "/api/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_participants_reflect_hub_state() {
    let state = Arc::new(AppState::new(Config::default()));
    let (conn_id, _tx, _rx) = state.hub.connect().await;
    state
        .hub
        .join(
            conn_id,
            &JoinDocument {
                document_id: "doc1".to_string(),
                user_id: "alice".to_string(),
                user_name: "Alice".to_string(),
            },
        )
        .await
        .unwrap();
    state
        .hub
        .dispatch(
            conn_id,
            CollaborationMessage {
                kind: MessageKind::Edit,
                user_id: "alice".to_string(),
                user_name: "Alice".to_string(),
                document_id: "doc1".to_string(),
                payload: json!({"content": "draft"}),
                timestamp: Utc::now(),
            },
        )
        .await
        .unwrap();

    let (status, body) = get_json(create_app(state.clone()), "/api/v1/documents/doc1/participants").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documentId"], "doc1");
    assert_eq!(body["revision"], 1);
    assert_eq!(body["activeUsers"][0]["userId"], "alice");

    let (status, body) = get_json(create_app(state), "/api/v1/documents/unknown/participants").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"], 0);
    assert_eq!(body["activeUsers"], json!([]));
}

#[tokio::test]
async fn test_blank_document_id_is_rejected() {
    let state = Arc::new(AppState::new(Config::default()));
    let (status, body) = get_json(create_app(state), "/api/v1/documents/%20/participants").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_diagnostics_counts_connections() {
    let state = Arc::new(AppState::new(Config::default()));
    let (_conn_id, _tx, _rx) = state.hub.connect().await;

    let (status, body) = get_json(create_app(state), "/api/v1/diagnostics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["n_conn"], 1);
    assert_eq!(body["n_rooms"], 0);
    assert_eq!(body["n_participants"], 0);
}
