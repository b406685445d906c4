use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{FoodItem, MealLog, MealType};
use crate::error::StoreError;

/// Row of `meal_logs` as read back. The per-nutrient columns are only used by
/// SQL-side reporting; the total is always rebuilt from `foods`.
#[derive(Debug, FromRow)]
pub struct MealLogRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_type: String,
    pub foods: Json<Vec<FoodItem>>,
    pub original_text: Option<String>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<MealLogRow> for MealLog {
    type Error = StoreError;

    fn try_from(r: MealLogRow) -> Result<Self, Self::Error> {
        let meal_type = r
            .meal_type
            .parse::<MealType>()
            .map_err(|e| StoreError::Corrupt(format!("meal {}: {e}", r.id)))?;
        MealLog::assemble(
            r.id,
            r.user_id,
            r.created_at,
            meal_type,
            r.foods.0,
            r.original_text,
        )
        .map_err(|e| StoreError::Corrupt(format!("meal {}: {e}", r.id)))
    }
}
