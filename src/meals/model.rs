use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

/// Category the nutrition service assigns to fast food items.
pub const FAST_FOOD_CATEGORY: &str = "fast_food";

/// Per-food or aggregated nutrition. Every field is finite and `>= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionValues {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

impl NutritionValues {
    pub const ZERO: NutritionValues = NutritionValues {
        calories: 0.0,
        protein: 0.0,
        carbs: 0.0,
        fat: 0.0,
        fiber: 0.0,
    };

    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64, fiber: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
            fiber,
        }
        .sanitized()
    }

    /// Replaces negative or non-finite values with 0.
    pub fn sanitized(self) -> Self {
        fn clean(v: f64) -> f64 {
            if v.is_finite() && v > 0.0 {
                v
            } else {
                0.0
            }
        }
        Self {
            calories: clean(self.calories),
            protein: clean(self.protein),
            carbs: clean(self.carbs),
            fat: clean(self.fat),
            fiber: clean(self.fiber),
        }
    }

    /// Left fold of `values` starting from zero.
    pub fn total<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a NutritionValues>,
    {
        values.into_iter().copied().sum()
    }
}

impl Add for NutritionValues {
    type Output = NutritionValues;

    fn add(self, rhs: NutritionValues) -> NutritionValues {
        NutritionValues {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
            fiber: self.fiber + rhs.fiber,
        }
    }
}

impl AddAssign for NutritionValues {
    fn add_assign(&mut self, rhs: NutritionValues) {
        *self = *self + rhs;
    }
}

impl Sum for NutritionValues {
    fn sum<I: Iterator<Item = NutritionValues>>(iter: I) -> Self {
        iter.fold(NutritionValues::ZERO, Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    name: String,
    portion_text: String,
    nutrition: NutritionValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

impl FoodItem {
    pub fn new(
        name: impl Into<String>,
        portion_text: impl Into<String>,
        nutrition: NutritionValues,
    ) -> Self {
        Self {
            name: name.into(),
            portion_text: portion_text.into(),
            nutrition: nutrition.sanitized(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn portion_text(&self) -> &str {
        &self.portion_text
    }

    pub fn nutrition(&self) -> &NutritionValues {
        &self.nutrition
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    #[default]
    Snack,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            other => Err(format!("unknown meal type: {other}")),
        }
    }
}

/// One persisted eating event. Only the log store builds these, and the
/// total is always the fold of `foods`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealLog {
    id: Uuid,
    user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    meal_type: MealType,
    foods: Vec<FoodItem>,
    total_nutrition: NutritionValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_text: Option<String>,
}

impl MealLog {
    pub(crate) fn assemble(
        id: Uuid,
        user_id: Uuid,
        timestamp: OffsetDateTime,
        meal_type: MealType,
        foods: Vec<FoodItem>,
        original_text: Option<String>,
    ) -> Result<Self, StoreError> {
        if foods.is_empty() {
            return Err(StoreError::Validation(
                "a meal log needs at least one food".into(),
            ));
        }
        let total_nutrition = NutritionValues::total(foods.iter().map(FoodItem::nutrition));
        Ok(Self {
            id,
            user_id,
            timestamp,
            meal_type,
            foods,
            total_nutrition,
            original_text,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn meal_type(&self) -> MealType {
        self.meal_type
    }

    pub fn foods(&self) -> &[FoodItem] {
        &self.foods
    }

    pub fn total_nutrition(&self) -> &NutritionValues {
        &self.total_nutrition
    }

    pub fn original_text(&self) -> Option<&str> {
        self.original_text.as_deref()
    }

    pub fn is_fast_food(&self) -> bool {
        self.foods
            .iter()
            .any(|f| f.category() == Some(FAST_FOOD_CATEGORY))
    }
}
