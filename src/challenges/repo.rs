use anyhow::Context;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use super::repo_types::{Challenge, ParticipantScore};

const CHALLENGE_COLUMNS: &str = "id, name, starts_on, ends_on, created_by, created_at";

/// Create a challenge; the creator joins in the same transaction.
pub async fn create(
    db: &PgPool,
    name: &str,
    starts_on: Date,
    ends_on: Date,
    created_by: Uuid,
) -> anyhow::Result<Challenge> {
    let mut tx = db.begin().await.context("begin tx")?;
    let challenge = sqlx::query_as::<_, Challenge>(&format!(
        r#"
        INSERT INTO challenges (name, starts_on, ends_on, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING {CHALLENGE_COLUMNS}
        "#
    ))
    .bind(name)
    .bind(starts_on)
    .bind(ends_on)
    .bind(created_by)
    .fetch_one(&mut *tx)
    .await
    .context("insert challenge")?;

    sqlx::query("INSERT INTO challenge_participants (challenge_id, user_id) VALUES ($1, $2)")
        .bind(challenge.id)
        .bind(created_by)
        .execute(&mut *tx)
        .await
        .context("join own challenge")?;
    tx.commit().await.context("commit tx")?;
    Ok(challenge)
}

pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Challenge>> {
    let rows = sqlx::query_as::<_, Challenge>(&format!(
        r#"
        SELECT {CHALLENGE_COLUMNS}
        FROM challenges
        ORDER BY starts_on DESC, created_at DESC
        LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Challenge>> {
    let row = sqlx::query_as::<_, Challenge>(&format!(
        "SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Idempotent join; returns false when the user was already in.
pub async fn join(db: &PgPool, challenge_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO challenge_participants (challenge_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (challenge_id, user_id) DO NOTHING
        "#,
    )
    .bind(challenge_id)
    .bind(user_id)
    .execute(db)
    .await
    .context("join challenge")?;
    Ok(result.rows_affected() > 0)
}

/// Participant scores over the challenge window, best first. Reads the
/// materialized daily aggregates, never the raw items.
pub async fn participant_scores(
    db: &PgPool,
    challenge_id: Uuid,
) -> anyhow::Result<Vec<ParticipantScore>> {
    let rows = sqlx::query_as::<_, ParticipantScore>(
        r#"
        SELECT u.id AS user_id,
               u.username,
               COUNT(a.day) FILTER (WHERE a.goal_achieved) AS days_achieved,
               COUNT(a.day) AS days_logged
        FROM challenge_participants p
        JOIN challenges c ON c.id = p.challenge_id
        JOIN users u ON u.id = p.user_id
        LEFT JOIN daily_aggregates a
               ON a.user_id = p.user_id
              AND a.day BETWEEN c.starts_on AND c.ends_on
        WHERE p.challenge_id = $1
        GROUP BY u.id, u.username
        ORDER BY days_achieved DESC, u.username ASC
        "#,
    )
    .bind(challenge_id)
    .fetch_all(db)
    .await
    .context("leaderboard query")?;
    Ok(rows)
}
