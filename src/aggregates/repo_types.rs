use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;
use uuid::Uuid;

/// Materialized per-user per-day summary row. Derived state only: meal items
/// are the source of truth and this row is rebuilt inside every transaction
/// that mutates them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyAggregate {
    pub user_id: Uuid,
    pub day: Date,
    pub total_calories: f64,
    pub meals_logged: i64,
    pub goal_achieved: bool,
}

/// The three derived fields of a bucket, computed by the pure fold in
/// `maintainer::summarize`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketTotals {
    pub total_calories: f64,
    pub meals_logged: i64,
    pub goal_achieved: bool,
}
