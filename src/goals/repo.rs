use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::StoredGoals;
use crate::error::GoalConfigError;

#[async_trait]
pub trait GoalsSource: Send + Sync {
    async fn stored_goals(&self, user_id: Uuid) -> Result<Option<StoredGoals>, GoalConfigError>;
}

pub struct PgGoalsSource {
    db: PgPool,
}

impl PgGoalsSource {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GoalsSource for PgGoalsSource {
    async fn stored_goals(&self, user_id: Uuid) -> Result<Option<StoredGoals>, GoalConfigError> {
        sqlx::query_as::<_, StoredGoals>(
            r#"
            SELECT daily_calories, daily_protein, daily_carbs, daily_fat
            FROM user_goals
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| GoalConfigError::Lookup(e.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryGoalsSource {
    goals: RwLock<HashMap<Uuid, StoredGoals>>,
}

impl MemoryGoalsSource {
    pub async fn set(&self, user_id: Uuid, goals: StoredGoals) {
        self.goals.write().await.insert(user_id, goals);
    }
}

#[async_trait]
impl GoalsSource for MemoryGoalsSource {
    async fn stored_goals(&self, user_id: Uuid) -> Result<Option<StoredGoals>, GoalConfigError> {
        Ok(self.goals.read().await.get(&user_id).copied())
    }
}
