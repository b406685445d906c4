mod repo;

pub use repo::{GoalsSource, MemoryGoalsSource, PgGoalsSource};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

use crate::config::GoalDefaults;
use crate::error::GoalConfigError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Goals {
    pub daily_calories: f64,
    pub daily_protein: f64,
    pub daily_carbs: f64,
    pub daily_fat: f64,
}

/// A user's goals as configured; any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, FromRow)]
pub struct StoredGoals {
    pub daily_calories: Option<f64>,
    pub daily_protein: Option<f64>,
    pub daily_carbs: Option<f64>,
    pub daily_fat: Option<f64>,
}

impl GoalDefaults {
    pub fn goals(&self) -> Goals {
        Goals {
            daily_calories: self.daily_calories,
            daily_protein: self.daily_protein,
            daily_carbs: self.daily_carbs,
            daily_fat: self.daily_fat,
        }
    }

    /// Fills missing or unusable fields from the defaults and reports every substitution
    /// that was caused by a bad value.
    pub fn resolve(&self, stored: Option<StoredGoals>) -> (Goals, Vec<GoalConfigError>) {
        let stored = stored.unwrap_or_default();
        let mut problems = Vec::new();
        let mut pick = |field: &'static str, value: Option<f64>, default: f64| match value {
            Some(v) if v.is_finite() && v > 0.0 => v,
            Some(v) => {
                problems.push(GoalConfigError::Invalid { field, value: v });
                default
            }
            None => default,
        };
        let goals = Goals {
            daily_calories: pick("daily_calories", stored.daily_calories, self.daily_calories),
            daily_protein: pick("daily_protein", stored.daily_protein, self.daily_protein),
            daily_carbs: pick("daily_carbs", stored.daily_carbs, self.daily_carbs),
            daily_fat: pick("daily_fat", stored.daily_fat, self.daily_fat),
        };
        (goals, problems)
    }
}

/// The user's effective goals. Configuration problems are logged and papered over.
pub async fn goals_for(st: &AppState, user_id: Uuid) -> Goals {
    let defaults = &st.config.goal_defaults;
    let stored = match st.goals.stored_goals(user_id).await {
        Ok(stored) => stored,
        Err(e) => {
            warn!(error = %e, %user_id, "goals unavailable, using defaults");
            None
        }
    };
    let (goals, problems) = defaults.resolve(stored);
    for p in problems {
        warn!(error = %p, %user_id, "goal replaced by default");
    }
    goals
}
