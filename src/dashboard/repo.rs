use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use crate::meals::repo_types::MealType;

use super::dto::DashboardMeal;

/// Per-meal breakdown for one day. Detail rows only; the day's totals are
/// read from the materialized aggregate.
pub async fn meal_breakdown(
    db: &PgPool,
    user_id: Uuid,
    day: Date,
) -> anyhow::Result<Vec<DashboardMeal>> {
    let rows: Vec<(Uuid, MealType, bool, f64, i64)> = sqlx::query_as(
        r#"
        SELECT m.id, m.meal_type, m.needs_review,
               COALESCE(SUM(i.calories), 0) AS calories,
               COUNT(i.id) AS item_count
        FROM meals m
        LEFT JOIN meal_items i ON i.meal_id = m.id
        WHERE m.user_id = $1 AND m.meal_date = $2
        GROUP BY m.id
        ORDER BY m.created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(day)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, meal_type, needs_review, calories, item_count)| DashboardMeal {
                id,
                meal_type,
                needs_review,
                calories,
                item_count,
            },
        )
        .collect())
}
