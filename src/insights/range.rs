use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Duration};
use uuid::Uuid;

use super::daily::daily_total;
use crate::config::MAX_CALENDAR_DAYS;
use crate::error::StoreError;
use crate::meals::model::{MealLog, NutritionValues};
use crate::meals::repo::DayBuckets;
use crate::state::AppState;

pub const WEEK_DAYS: u32 = 7;
const TOP_FOODS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: Date,
    pub total_nutrition: NutritionValues,
    pub meal_count: usize,
    /// Chronological; present only when detail was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meals: Option<Vec<MealLog>>,
}

/// One summary per day that has logs, most recent day first.
pub fn summarize_days(buckets: &DayBuckets, detail: bool) -> Vec<DaySummary> {
    buckets
        .iter()
        .rev()
        .filter(|(_, logs)| !logs.is_empty())
        .map(|(date, logs)| DaySummary {
            date: *date,
            total_nutrition: daily_total(logs),
            meal_count: logs.len(),
            meals: detail.then(|| logs.clone()),
        })
        .collect()
}

/// Calendar over the trailing `days` days, today included. Zero days is an empty calendar.
pub async fn compute_calendar(
    st: &AppState,
    user_id: Uuid,
    days: u32,
    detail: bool,
) -> Result<Vec<DaySummary>, StoreError> {
    if days == 0 {
        return Ok(Vec::new());
    }
    let (from, to) = st.days.trailing(days.min(MAX_CALENDAR_DAYS));
    let buckets = st.store.query_range(user_id, from, to).await?;
    Ok(summarize_days(&buckets, detail))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoodCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub days_considered: usize,
    pub avg_calories: f64,
    pub avg_protein: f64,
    pub fast_food_meals: usize,
    pub total_meals: usize,
    pub top_foods: Vec<FoodCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeeklyReport {
    InsufficientData,
    Summary(WeeklySummary),
}

impl WeeklyReport {
    pub fn summary(&self) -> Option<&WeeklySummary> {
        match self {
            WeeklyReport::Summary(s) => Some(s),
            WeeklyReport::InsufficientData => None,
        }
    }
}

/// Rolls up the week ending on `today`. Averages are over days that have logs.
pub fn summarize_week(buckets: &DayBuckets, today: Date) -> WeeklyReport {
    let first = today - Duration::days(i64::from(WEEK_DAYS) - 1);
    let days: Vec<&Vec<MealLog>> = buckets
        .range(first..=today)
        .map(|(_, logs)| logs)
        .filter(|logs| !logs.is_empty())
        .collect();

    if days.is_empty() {
        return WeeklyReport::InsufficientData;
    }

    let day_totals: Vec<NutritionValues> = days.iter().map(|logs| daily_total(logs)).collect();
    let week_total = NutritionValues::total(&day_totals);
    let n = days.len() as f64;

    let meals = days.iter().flat_map(|logs| logs.iter());
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    let mut fast_food_meals = 0;
    let mut total_meals = 0;
    for meal in meals {
        total_meals += 1;
        if meal.is_fast_food() {
            fast_food_meals += 1;
        }
        for food in meal.foods() {
            *frequency.entry(food.name()).or_default() += 1;
        }
    }

    let mut top_foods: Vec<FoodCount> = frequency
        .into_iter()
        .map(|(name, count)| FoodCount {
            name: name.to_string(),
            count,
        })
        .collect();
    top_foods.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    top_foods.truncate(TOP_FOODS);

    WeeklyReport::Summary(WeeklySummary {
        days_considered: days.len(),
        avg_calories: week_total.calories / n,
        avg_protein: week_total.protein / n,
        fast_food_meals,
        total_meals,
        top_foods,
    })
}

pub async fn compute_weekly_summary(st: &AppState, user_id: Uuid) -> Result<WeeklyReport, StoreError> {
    let (from, to) = st.days.trailing(WEEK_DAYS);
    let buckets = st.store.query_range(user_id, from, to).await?;
    Ok(summarize_week(&buckets, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::model::{MealType, FAST_FOOD_CATEGORY};
    use crate::test_support::{food, Harness};

    #[tokio::test]
    async fn calendar_is_sparse_and_most_recent_first() {
        let h = Harness::new();
        let user = Uuid::new_v4();

        h.clock.advance(Duration::days(-3));
        h.append(user, MealType::Lunch, vec![food("rice", 200.0, 4.0)])
            .await;
        h.clock.advance(Duration::days(3));
        h.append(user, MealType::Lunch, vec![food("salmon", 206.0, 22.0)])
            .await;
        h.append(user, MealType::Dinner, vec![food("steak", 250.0, 26.0)])
            .await;

        let calendar = compute_calendar(&h.state, user, 30, true).await.unwrap();
        assert_eq!(calendar.len(), 2);
        assert_eq!(calendar[0].date, h.state.days.today());
        assert_eq!(calendar[0].meal_count, 2);
        assert_eq!(calendar[0].total_nutrition.calories, 456.0);
        assert_eq!(calendar[1].meal_count, 1);

        let meals = calendar[0].meals.as_ref().unwrap();
        assert!(meals[0].timestamp() <= meals[1].timestamp());

        let plain = compute_calendar(&h.state, user, 30, false).await.unwrap();
        assert!(plain.iter().all(|d| d.meals.is_none()));
    }

    #[tokio::test]
    async fn new_day_adds_exactly_one_summary() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        h.append(user, MealType::Lunch, vec![food("rice", 200.0, 4.0)])
            .await;
        let before = compute_calendar(&h.state, user, 30, false).await.unwrap();

        h.clock.advance(Duration::days(1));
        h.append(user, MealType::Breakfast, vec![food("oatmeal", 158.0, 6.0)])
            .await;
        let after = compute_calendar(&h.state, user, 30, false).await.unwrap();

        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(after[1..], before[..]);
    }

    #[tokio::test]
    async fn calendar_window_excludes_older_days() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        h.clock.advance(Duration::days(-10));
        h.append(user, MealType::Lunch, vec![food("rice", 200.0, 4.0)])
            .await;
        h.clock.advance(Duration::days(10));

        assert!(compute_calendar(&h.state, user, 7, false)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(compute_calendar(&h.state, user, 11, false).await.unwrap().len(), 1);
        assert!(compute_calendar(&h.state, user, 0, false)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn weekly_averages_divide_by_logged_days() {
        let h = Harness::new();
        let user = Uuid::new_v4();

        h.clock.advance(Duration::days(-4));
        h.append(user, MealType::Lunch, vec![food("pasta", 1200.0, 40.0)])
            .await;
        h.append(user, MealType::Dinner, vec![food("pasta", 600.0, 20.0)])
            .await;
        h.clock.advance(Duration::days(4));
        h.append(user, MealType::Lunch, vec![food("salad", 1000.0, 80.0)])
            .await;

        let report = compute_weekly_summary(&h.state, user).await.unwrap();
        let summary = report.summary().expect("two logged days");
        assert_eq!(summary.days_considered, 2);
        assert_eq!(summary.avg_calories, 1400.0);
        assert_eq!(summary.avg_protein, 70.0);
        assert_eq!(summary.total_meals, 3);
        assert_eq!(
            summary.top_foods[0],
            FoodCount {
                name: "pasta".into(),
                count: 2
            }
        );
    }

    #[tokio::test]
    async fn weekly_without_logs_is_insufficient_data() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        h.clock.advance(Duration::days(-8));
        h.append(user, MealType::Lunch, vec![food("rice", 200.0, 4.0)])
            .await;
        h.clock.advance(Duration::days(8));

        let report = compute_weekly_summary(&h.state, user).await.unwrap();
        assert_eq!(report, WeeklyReport::InsufficientData);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"status": "insufficient_data"})
        );
    }

    #[tokio::test]
    async fn weekly_counts_fast_food_meals() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        let burger = food("burger", 354.0, 20.0).with_category(FAST_FOOD_CATEGORY);
        let fries = food("fries", 312.0, 3.4).with_category(FAST_FOOD_CATEGORY);

        h.append(user, MealType::Lunch, vec![burger.clone(), fries]).await;
        h.append(user, MealType::Dinner, vec![burger]).await;
        h.append(user, MealType::Snack, vec![food("apple", 95.0, 0.5)])
            .await;

        let report = compute_weekly_summary(&h.state, user).await.unwrap();
        assert_eq!(report.summary().unwrap().fast_food_meals, 2);
    }

    #[tokio::test]
    async fn aggregates_are_idempotent() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        h.append(user, MealType::Lunch, vec![food("rice", 205.3, 4.3)])
            .await;
        h.append(user, MealType::Snack, vec![food("egg", 78.1, 6.5)])
            .await;

        let a = compute_weekly_summary(&h.state, user).await.unwrap();
        let b = compute_weekly_summary(&h.state, user).await.unwrap();
        let (sa, sb) = (a.summary().unwrap(), b.summary().unwrap());
        assert_eq!(sa.avg_calories.to_bits(), sb.avg_calories.to_bits());
        assert_eq!(sa.avg_protein.to_bits(), sb.avg_protein.to_bits());

        let c1 = compute_calendar(&h.state, user, 30, true).await.unwrap();
        let c2 = compute_calendar(&h.state, user, 30, true).await.unwrap();
        assert_eq!(c1, c2);
    }
}
