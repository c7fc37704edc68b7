use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use crate::{
    aggregates::maintainer::fetch_bucket,
    auth::AuthUser,
    auth::repo_types::User,
    dashboard::dto::{remaining, DashboardResponse},
    dashboard::repo,
    error::ApiError,
    meals::dto::parse_day,
    state::AppState,
};

/// GET /dashboard/:date — progress for one calendar day. A bucket with no
/// meals ever logged has no aggregate row; it reads as zero totals with the
/// goal trivially achieved.
#[instrument(skip(state))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let day = parse_day(&date)?;

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let aggregate = fetch_bucket(&state.db, user_id, day).await?;
    let (total_calories, meals_logged, goal_achieved) = match aggregate {
        Some(a) => (a.total_calories, a.meals_logged, a.goal_achieved),
        None => (0.0, 0, true),
    };

    let meals = repo::meal_breakdown(&state.db, user_id, day).await?;

    Ok(Json(DashboardResponse {
        day,
        daily_calorie_goal: user.daily_calorie_goal,
        total_calories,
        meals_logged,
        goal_achieved,
        remaining_calories: remaining(total_calories, user.daily_calorie_goal),
        meals,
    }))
}
