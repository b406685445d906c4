use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::SendMessageRequest;
use super::session::{SessionView, TurnResult};
use crate::auth::AuthUser;
use crate::error::LogError;
use crate::meals::handlers::rejection;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/sessions", post(start_session))
        .route("/chat/sessions/:id", get(get_session).delete(end_session))
        .route("/chat/sessions/:id/messages", post(send_message))
}

#[instrument(skip(state))]
pub async fn start_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> (StatusCode, Json<SessionView>) {
    let view = state.sessions.start(user_id).await;
    (StatusCode::CREATED, Json(view))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, (StatusCode, String)> {
    let session = state.sessions.get(user_id, id).await.ok_or_else(not_found)?;
    let view = session.lock().await.view();
    Ok(Json(view))
}

/// POST /chat/sessions/:id/messages { message }
#[instrument(skip(state, body))]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<TurnResult>, (StatusCode, String)> {
    let session = state.sessions.get(user_id, id).await.ok_or_else(not_found)?;
    let mut session = session.lock().await;
    let result = session
        .handle_turn(&state, &body.message)
        .await
        .map_err(|e: LogError| rejection(&e))?;
    Ok(Json(result))
}

#[instrument(skip(state))]
pub async fn end_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.sessions.end(user_id, id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Session not found".into())
}
