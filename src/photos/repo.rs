use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Link an uploaded object to a meal, within the caller's transaction so the
/// meal row and its photo link commit together.
pub async fn insert_photo_tx(
    tx: &mut Transaction<'_, Postgres>,
    photo_id: Uuid,
    meal_id: Uuid,
    s3_key: &str,
    content_type: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO photos (id, meal_id, s3_key, content_type)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(photo_id)
    .bind(meal_id)
    .bind(s3_key)
    .bind(content_type)
    .execute(&mut **tx)
    .await
    .context("insert photo")?;
    Ok(())
}

/// All photo keys for a meal, oldest first.
pub async fn list_keys_by_meal(db: &PgPool, meal_id: Uuid) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT s3_key
          FROM photos
         WHERE meal_id = $1
         ORDER BY created_at ASC
        "#,
    )
    .bind(meal_id)
    .fetch_all(db)
    .await
    .context("list photos by meal")?;
    Ok(rows.into_iter().map(|(k,)| k).collect())
}

/// The first photo of a meal, if any.
pub async fn first_key_by_meal(db: &PgPool, meal_id: Uuid) -> anyhow::Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT s3_key
          FROM photos
         WHERE meal_id = $1
         ORDER BY created_at ASC
         LIMIT 1
        "#,
    )
    .bind(meal_id)
    .fetch_optional(db)
    .await
    .context("get first photo by meal")?;
    Ok(row.map(|(k,)| k))
}
