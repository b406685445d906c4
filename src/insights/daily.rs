use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::error::StoreError;
use crate::goals::Goals;
use crate::meals::model::{MealLog, NutritionValues};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Calories,
    Protein,
    Carbs,
    Fat,
}

/// Goal-relative percentages, each clamped to `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Progress {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Progress {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Calories => self.calories,
            Metric::Protein => self.protein,
            Metric::Carbs => self.carbs,
            Metric::Fat => self.fat,
        }
    }
}

/// `clamp(100 * value / goal, 0, 100)`, or 0 when the goal is not a positive number.
pub fn percent(value: f64, goal: f64) -> f64 {
    if !(goal.is_finite() && goal > 0.0) || !value.is_finite() {
        return 0.0;
    }
    (100.0 * value / goal).clamp(0.0, 100.0)
}

pub fn compute_progress(total: &NutritionValues, goals: &Goals) -> Progress {
    Progress {
        calories: percent(total.calories, goals.daily_calories),
        protein: percent(total.protein, goals.daily_protein),
        carbs: percent(total.carbs, goals.daily_carbs),
        fat: percent(total.fat, goals.daily_fat),
    }
}

pub fn daily_total(logs: &[MealLog]) -> NutritionValues {
    NutritionValues::total(logs.iter().map(MealLog::total_nutrition))
}

pub async fn compute_daily_total(st: &AppState, user_id: Uuid) -> Result<NutritionValues, StoreError> {
    let logs = st.store.query_day(user_id, st.days.today()).await?;
    Ok(daily_total(&logs))
}

/// Daily view: today's total, the goals it is measured against and the clamped progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyView {
    pub date: Date,
    pub daily_total: NutritionValues,
    pub goals: Goals,
    pub progress: Progress,
    pub meal_count: usize,
}

impl DailyView {
    pub fn from_logs(date: Date, logs: &[MealLog], goals: Goals) -> Self {
        let daily_total = daily_total(logs);
        Self {
            date,
            progress: compute_progress(&daily_total, &goals),
            daily_total,
            goals,
            meal_count: logs.len(),
        }
    }
}

/// Today's logs, most recent first.
pub fn most_recent_first(mut logs: Vec<MealLog>) -> Vec<MealLog> {
    logs.reverse();
    logs
}
