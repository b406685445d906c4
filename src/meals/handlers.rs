use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::LogMealRequest;
use super::model::MealLog;
use super::services::{log_meal, LogOutcome, LogRequest};
use crate::auth::AuthUser;
use crate::error::{FailureKind, LogError};
use crate::insights::today_logs;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route("/meals/today", get(list_today))
}

/// POST /meals { description, meal_type }
#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<LogMealRequest>,
) -> Result<(StatusCode, Json<LogOutcome>), (StatusCode, String)> {
    let outcome = log_meal(
        &state,
        user_id,
        LogRequest::new(body.description, body.meal_type),
    )
    .await
    .map_err(|e| rejection(&e))?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Today's logs, most recent first.
#[instrument(skip(state))]
pub async fn list_today(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<MealLog>>, (StatusCode, String)> {
    let logs = today_logs(&state, user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "list_today failed");
        rejection(&LogError::Store(e))
    })?;
    Ok(Json(logs))
}

/// Maps a logging failure onto a status and user-facing text.
pub(crate) fn rejection(e: &LogError) -> (StatusCode, String) {
    let status = match e.kind() {
        FailureKind::EmptyInput => StatusCode::BAD_REQUEST,
        FailureKind::Parse => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.user_message())
}
