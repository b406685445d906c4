use serde::Deserialize;

use super::model::MealType;

#[derive(Debug, Deserialize)]
pub struct LogMealRequest {
    pub description: String,
    #[serde(default)]
    pub meal_type: MealType,
}
