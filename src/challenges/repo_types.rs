use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Challenge {
    pub id: Uuid,
    pub name: String,
    pub starts_on: Date,
    pub ends_on: Date,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
}

/// One participant's score over the challenge window, straight from the
/// daily aggregates.
#[derive(Debug, Clone, FromRow)]
pub struct ParticipantScore {
    pub user_id: Uuid,
    pub username: String,
    pub days_achieved: i64,
    pub days_logged: i64,
}
