//! Read-side views. Every value here is recomputed from the log store on demand.

pub mod daily;
mod dto;
pub mod handlers;
pub mod range;
pub mod recommendations;

use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::goals::goals_for;
use crate::meals::model::MealLog;
use crate::state::AppState;
use daily::{most_recent_first, DailyView};
use range::{summarize_days, summarize_week, DaySummary, WEEK_DAYS};
use recommendations::{derive, weekly_insight, Recommendation, WeeklyInsight};

pub fn router() -> Router<AppState> {
    handlers::routes()
}

/// All dashboard views computed from one read of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub daily: DailyView,
    pub today_logs: Vec<MealLog>,
    pub recommendations: Vec<Recommendation>,
    pub calendar: Vec<DaySummary>,
    pub weekly: WeeklyInsight,
}

pub async fn build_snapshot(st: &AppState, user_id: Uuid) -> Result<DashboardSnapshot, StoreError> {
    let window = st.config.calendar_default_days.max(WEEK_DAYS);
    let (from, today) = st.days.trailing(window);
    let goals = goals_for(st, user_id).await;
    let buckets = st.store.query_range(user_id, from, today).await?;

    let todays = buckets.get(&today).cloned().unwrap_or_default();
    let daily = DailyView::from_logs(today, &todays, goals);
    let report = summarize_week(&buckets, today);
    let recommendations = derive(&daily.daily_total, daily.meal_count, &goals, &report);

    let calendar_from = today - time::Duration::days(i64::from(st.config.calendar_default_days) - 1);
    let mut calendar = summarize_days(&buckets, false);
    calendar.retain(|d| d.date >= calendar_from);

    Ok(DashboardSnapshot {
        daily,
        today_logs: most_recent_first(todays),
        recommendations,
        calendar,
        weekly: weekly_insight(report, &goals),
    })
}

pub async fn daily_view(st: &AppState, user_id: Uuid) -> Result<DailyView, StoreError> {
    let today = st.days.today();
    let goals = goals_for(st, user_id).await;
    let logs = st.store.query_day(user_id, today).await?;
    Ok(DailyView::from_logs(today, &logs, goals))
}

pub async fn today_logs(st: &AppState, user_id: Uuid) -> Result<Vec<MealLog>, StoreError> {
    let logs = st.store.query_day(user_id, st.days.today()).await?;
    Ok(most_recent_first(logs))
}

pub async fn recommendation_feed(st: &AppState, user_id: Uuid) -> Result<Vec<Recommendation>, StoreError> {
    let (from, today) = st.days.trailing(WEEK_DAYS);
    let goals = goals_for(st, user_id).await;
    let buckets = st.store.query_range(user_id, from, today).await?;
    let todays = buckets.get(&today).map(Vec::as_slice).unwrap_or_default();
    let total = daily::daily_total(todays);
    Ok(derive(&total, todays.len(), &goals, &summarize_week(&buckets, today)))
}

pub async fn weekly_insight_view(st: &AppState, user_id: Uuid) -> Result<WeeklyInsight, StoreError> {
    let goals = goals_for(st, user_id).await;
    let report = range::compute_weekly_summary(st, user_id).await?;
    Ok(weekly_insight(report, &goals))
}
