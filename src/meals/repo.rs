use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::Date;
use tracing::debug;
use uuid::Uuid;

use super::model::{FoodItem, MealLog, MealType, NutritionValues};
use super::repo_types::MealLogRow;
use crate::clock::LocalDays;
use crate::error::StoreError;

/// A meal about to be appended. Identity, timestamp and total are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMealLog {
    pub user_id: Uuid,
    pub meal_type: MealType,
    pub foods: Vec<FoodItem>,
    pub original_text: Option<String>,
}

pub type DayBuckets = BTreeMap<Date, Vec<MealLog>>;

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Assigns id and timestamp, computes the total and persists, as one unit.
    async fn append(&self, entry: NewMealLog) -> Result<MealLog, StoreError>;

    /// Logs of every local day in `from..=to`, each day chronological.
    /// Days without logs are absent.
    async fn query_range(
        &self,
        user_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<DayBuckets, StoreError>;

    async fn query_day(&self, user_id: Uuid, date: Date) -> Result<Vec<MealLog>, StoreError> {
        let mut buckets = self.query_range(user_id, date, date).await?;
        Ok(buckets.remove(&date).unwrap_or_default())
    }
}

pub(crate) fn ensure_foods(entry: &NewMealLog) -> Result<(), StoreError> {
    if entry.foods.is_empty() {
        return Err(StoreError::Validation(
            "a meal log needs at least one food".into(),
        ));
    }
    Ok(())
}

pub struct PgLogStore {
    db: PgPool,
    days: LocalDays,
}

impl PgLogStore {
    pub fn new(db: PgPool, days: LocalDays) -> Self {
        Self { db, days }
    }
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn append(&self, entry: NewMealLog) -> Result<MealLog, StoreError> {
        ensure_foods(&entry)?;
        let id = Uuid::new_v4();
        let total = NutritionValues::total(entry.foods.iter().map(FoodItem::nutrition));

        let row = sqlx::query_as::<_, MealLogRow>(
            r#"
            INSERT INTO meal_logs (id, user_id, meal_type, foods, calories, protein, carbs, fat, fiber,
                                   original_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, user_id, meal_type, foods, original_text, created_at
            "#,
        )
        .bind(id)
        .bind(entry.user_id)
        .bind(entry.meal_type.as_str())
        .bind(Json(&entry.foods))
        .bind(total.calories)
        .bind(total.protein)
        .bind(total.carbs)
        .bind(total.fat)
        .bind(total.fiber)
        .bind(entry.original_text.as_deref())
        .bind(self.days.now())
        .fetch_one(&self.db)
        .await?;

        debug!(meal_id = %id, user_id = %entry.user_id, "meal log inserted");
        MealLog::try_from(row)
    }

    async fn query_range(
        &self,
        user_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<DayBuckets, StoreError> {
        let mut buckets = DayBuckets::new();
        if from > to {
            return Ok(buckets);
        }
        let (start, end) = self.days.bounds(from, to);

        let rows = sqlx::query_as::<_, MealLogRow>(
            r#"
            SELECT id, user_id, meal_type, foods, original_text, created_at
            FROM meal_logs
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        for row in rows {
            let log = MealLog::try_from(row)?;
            buckets
                .entry(self.days.date_of(log.timestamp()))
                .or_default()
                .push(log);
        }
        Ok(buckets)
    }
}
