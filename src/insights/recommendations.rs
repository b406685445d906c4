use serde::Serialize;

use super::range::{WeeklyReport, WeeklySummary};
use crate::goals::Goals;
use crate::meals::model::NutritionValues;

pub const MAX_RECOMMENDATIONS: usize = 5;
const MAX_SUGGESTIONS: usize = 3;
const REPEAT_ALERT: usize = 3;
const FAST_FOOD_ALERT: usize = 3;
const CONSISTENT_MEALS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Positive,
    #[serde(rename = "calories")]
    CaloriesConcern,
    #[serde(rename = "protein")]
    ProteinConcern,
    Other,
}

impl RecommendationKind {
    /// Display order: concerns, then affirmations, then tips.
    pub fn rank(self) -> u8 {
        match self {
            RecommendationKind::CaloriesConcern | RecommendationKind::ProteinConcern => 0,
            RecommendationKind::Positive => 1,
            RecommendationKind::Other => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub icon: &'static str,
    pub message: String,
}

impl Recommendation {
    fn new(kind: RecommendationKind, icon: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            icon,
            message: message.into(),
        }
    }
}

/// Recommendations from today's total and the trailing week, at most
/// [`MAX_RECOMMENDATIONS`], ordered by [`RecommendationKind::rank`].
pub fn derive(
    total: &NutritionValues,
    meals_today: usize,
    goals: &Goals,
    weekly: &WeeklyReport,
) -> Vec<Recommendation> {
    use RecommendationKind::*;

    let mut recs = Vec::new();
    let protein = total.protein;
    let calories = total.calories;
    let protein_goal = goals.daily_protein;
    let calorie_goal = goals.daily_calories;

    if meals_today > 0 {
        if protein < protein_goal * 0.5 {
            recs.push(Recommendation::new(
                ProteinConcern,
                "💪",
                format!(
                    "You're at {}g protein today. Your goal is {}g, so try adding chicken, fish or Greek yogurt to your next meal.",
                    protein.round(),
                    protein_goal.round()
                ),
            ));
        } else if protein >= protein_goal * 2.0 / 3.0 && protein < protein_goal {
            recs.push(Recommendation::new(
                ProteinConcern,
                "🎯",
                format!(
                    "Nice! You're at {}g protein, almost at your {}g goal.",
                    protein.round(),
                    protein_goal.round()
                ),
            ));
        }

        if calories > calorie_goal * 1.1 {
            recs.push(Recommendation::new(
                CaloriesConcern,
                "⚠️",
                format!(
                    "You're at {} calories today. Maybe go for something lighter next time.",
                    calories.round()
                ),
            ));
        } else if calories < calorie_goal * 0.6 && meals_today >= 2 {
            recs.push(Recommendation::new(
                CaloriesConcern,
                "🍽️",
                format!(
                    "You're only at {} calories. Make sure you're eating enough to fuel your body.",
                    calories.round()
                ),
            ));
        }

        if protein >= protein_goal * 2.0 / 3.0 && calories <= calorie_goal {
            recs.push(Recommendation::new(
                Positive,
                "✅",
                "Looking good! You're hitting your nutrition goals today.",
            ));
        }

        if meals_today >= CONSISTENT_MEALS {
            recs.push(Recommendation::new(
                Positive,
                "🌟",
                format!("Love the consistency! You've logged {meals_today} meals today."),
            ));
        }
    }

    if let Some(week) = weekly.summary() {
        if let Some(top) = week.top_foods.first().filter(|f| f.count >= REPEAT_ALERT) {
            recs.push(Recommendation::new(
                Other,
                "🔄",
                format!(
                    "You've had {} {} times this week. Try something new for variety?",
                    top.name, top.count
                ),
            ));
        }
        if week.fast_food_meals >= FAST_FOOD_ALERT {
            recs.push(Recommendation::new(
                Other,
                "🍔",
                format!(
                    "{} fast food meals this week. A home-cooked swap or two would help.",
                    week.fast_food_meals
                ),
            ));
        }
    }

    if recs.is_empty() && meals_today > 0 {
        recs.push(Recommendation::new(
            Positive,
            "✨",
            "Great job logging your meal!",
        ));
    }

    recs.sort_by_key(|r| r.kind.rank());
    recs.truncate(MAX_RECOMMENDATIONS);
    recs
}

/// Weekly-insight view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyInsight {
    pub report: WeeklyReport,
    pub insight: String,
    pub suggestions: Vec<String>,
}

pub const INSUFFICIENT_DATA_PROMPT: &str = "Log a few days of meals and I will summarize your week.";

pub fn weekly_insight(report: WeeklyReport, goals: &Goals) -> WeeklyInsight {
    let (insight, suggestions) = match &report {
        WeeklyReport::InsufficientData => (INSUFFICIENT_DATA_PROMPT.to_string(), Vec::new()),
        WeeklyReport::Summary(week) => (insight_line(week), suggestions(week, goals)),
    };
    WeeklyInsight {
        report,
        insight,
        suggestions,
    }
}

fn insight_line(week: &WeeklySummary) -> String {
    let days = match week.days_considered {
        1 => "1 logged day".to_string(),
        n => format!("{n} logged days"),
    };
    format!(
        "Across {days} you averaged {} calories and {}g protein per day.",
        week.avg_calories.round(),
        week.avg_protein.round()
    )
}

fn suggestions(week: &WeeklySummary, goals: &Goals) -> Vec<String> {
    let mut out = Vec::new();

    if week.avg_protein < goals.daily_protein * 0.5 {
        out.push(format!(
            "Protein is averaging well under your {}g goal. Add eggs, beans or lean meat to more meals.",
            goals.daily_protein.round()
        ));
    } else if week.avg_protein < goals.daily_protein {
        out.push("You're close on protein. One extra high-protein snack a day would close the gap.".into());
    }

    if week.avg_calories > goals.daily_calories * 1.1 {
        out.push(format!(
            "Your average is above your {} calorie goal. Lighter dinners are an easy place to start.",
            goals.daily_calories.round()
        ));
    } else if week.avg_calories < goals.daily_calories * 0.6 {
        out.push("Your average calories are low. Make sure you're eating enough through the day.".into());
    }

    if week.fast_food_meals >= FAST_FOOD_ALERT {
        out.push("Swap one fast food meal for something home-cooked this week.".into());
    }

    if let Some(top) = week.top_foods.first().filter(|f| f.count >= REPEAT_ALERT) {
        out.push(format!("{} shows up a lot. Try mixing in something new.", top.name));
    }

    if week.days_considered < 4 {
        out.push("Log every day for a fuller picture of your week.".into());
    }

    out.truncate(MAX_SUGGESTIONS);
    out
}
