use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::meals::repo_types::MealType;

#[derive(Debug, Serialize)]
pub struct DashboardMeal {
    pub id: Uuid,
    pub meal_type: MealType,
    pub needs_review: bool,
    pub calories: f64,
    pub item_count: i64,
}

/// Daily progress view. Totals come from the materialized aggregate, the one
/// source of truth for reads; the meal rows are detail, not a second total.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub day: Date,
    pub daily_calorie_goal: i32,
    pub total_calories: f64,
    pub meals_logged: i64,
    pub goal_achieved: bool,
    pub remaining_calories: f64,
    pub meals: Vec<DashboardMeal>,
}

/// Calories left before the goal; never negative.
pub fn remaining(total_calories: f64, daily_goal: i32) -> f64 {
    (f64::from(daily_goal) - total_calories).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_counts_down_and_floors_at_zero() {
        assert_eq!(remaining(0.0, 2000), 2000.0);
        assert_eq!(remaining(765.0, 2000), 1235.0);
        assert_eq!(remaining(2000.0, 2000), 0.0);
        assert_eq!(remaining(2400.0, 2000), 0.0);
    }
}
