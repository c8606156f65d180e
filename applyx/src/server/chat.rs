//! Chat routes, mounted once per chat surface.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use crate::chat::Orchestrator;
use crate::error::ChatError;
use crate::models::{SessionSummary, Turn};

/// Which prefix a set of routes is mounted under. The two surfaces answer
/// with slightly different bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// `/chat`: survey conversation with saved results.
    Chat,
    /// `/chatbot`: document-grounded admissions answers.
    Chatbot,
}

pub struct ChatApi {
    pub orchestrator: Arc<Orchestrator>,
    pub surface: Surface,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveResultRequest {
    pub session_id: String,
    pub result: String,
}

pub fn routes(api: Arc<ChatApi>) -> Router {
    let mut router = Router::new()
        .route("/session", post(create_session))
        .route("/send", post(send_message))
        .route("/history/{session_id}", get(history))
        .route("/session/{session_id}", get(session_info).delete(delete_session))
        .route("/sessions", get(list_sessions));

    router = match api.surface {
        Surface::Chat => router
            .route("/saveResult", post(save_result))
            .route("/getResult/{session_id}", get(get_result)),
        Surface::Chatbot => router.route("/", get(welcome)),
    };

    router.with_state(api)
}

async fn welcome() -> Json<Value> {
    Json(json!({ "message": "Welcome to the Admission Counseling Chatbot API" }))
}

/// The body is optional: an empty POST creates a session with a fresh id.
async fn create_session(
    State(api): State<Arc<ChatApi>>,
    body: Bytes,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?
    };

    let session_id = api
        .orchestrator
        .create_session(request.session_id)
        .await
        .map_err(|e| ApiError::chat(&e))?;
    Ok(Json(CreateSessionResponse { session_id }))
}

async fn send_message(
    State(api): State<Arc<ChatApi>>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    let Json(req) = payload?;
    let response = api
        .orchestrator
        .send(&req.session_id, &req.message)
        .await
        .map_err(|e| ApiError::chat(&e))?;
    Ok(Json(SendResponse { response }))
}

async fn history(
    State(api): State<Arc<ChatApi>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let turns: Vec<Turn> = api
        .orchestrator
        .history(&session_id)
        .await
        .map_err(|e| ApiError::chat(&e))?;
    Ok(Json(match api.surface {
        Surface::Chat => json!({ "history": turns }),
        Surface::Chatbot => json!({ "session_id": session_id, "history": turns }),
    }))
}

async fn session_info(
    State(api): State<Arc<ChatApi>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    api.orchestrator
        .session_info(&session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::chat(&e))
}

async fn list_sessions(State(api): State<Arc<ChatApi>>) -> Json<Value> {
    Json(json!({ "sessions": api.orchestrator.list_sessions().await }))
}

async fn delete_session(
    State(api): State<Arc<ChatApi>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !api.orchestrator.delete_session(&session_id).await {
        return Err(ApiError::chat(&ChatError::session_not_found(&session_id)));
    }
    let message = match api.surface {
        Surface::Chat => "Session deleted".to_string(),
        Surface::Chatbot => format!("Session {session_id} đã được xóa."),
    };
    Ok(Json(json!({ "message": message })))
}

async fn save_result(
    State(api): State<Arc<ChatApi>>,
    payload: Result<Json<SaveResultRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    api.orchestrator
        .save_result(&req.session_id, req.result)
        .await
        .map_err(|e| ApiError::chat(&e))?;
    Ok(Json(json!({
        "message": format!("Kết quả đã được lưu cho session {}.", req.session_id)
    })))
}

async fn get_result(
    State(api): State<Arc<ChatApi>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let result = api
        .orchestrator
        .get_result(&session_id)
        .await
        .map_err(|e| ApiError::chat(&e))?;
    Ok(Json(json!({ "session_id": session_id, "result": result })))
}
