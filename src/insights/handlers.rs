use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::daily::DailyView;
use super::dto::{CalendarQuery, RecommendationsResponse};
use super::range::{compute_calendar, DaySummary};
use super::recommendations::WeeklyInsight;
use crate::auth::AuthUser;
use crate::error::StoreError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/daily", get(get_daily))
        .route("/recommendations", get(get_recommendations))
        .route("/calendar", get(get_calendar))
        .route("/weekly-insight", get(get_weekly_insight))
}

#[instrument(skip(state))]
pub async fn get_daily(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DailyView>, (StatusCode, String)> {
    let view = super::daily_view(&state, user_id).await.map_err(internal)?;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn get_recommendations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<RecommendationsResponse>, (StatusCode, String)> {
    let recommendations = super::recommendation_feed(&state, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(RecommendationsResponse { recommendations }))
}

/// GET /calendar?days=30&detail=true
#[instrument(skip(state))]
pub async fn get_calendar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<CalendarQuery>,
) -> Result<Json<Vec<DaySummary>>, (StatusCode, String)> {
    let days = q.days.unwrap_or(state.config.calendar_default_days);
    let calendar = compute_calendar(&state, user_id, days, q.detail)
        .await
        .map_err(internal)?;
    Ok(Json(calendar))
}

#[instrument(skip(state))]
pub async fn get_weekly_insight(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<WeeklyInsight>, (StatusCode, String)> {
    let insight = super::weekly_insight_view(&state, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(insight))
}

fn internal(e: StoreError) -> (StatusCode, String) {
    error!(error = %e, "insight query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Could not load your data right now.".into(),
    )
}
