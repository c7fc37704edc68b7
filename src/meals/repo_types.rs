use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Fixed meal slots; matches the `meal_type` enum in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meal_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// Whether an item came out of the recognizer or was typed in by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Detected,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_date: Date,
    pub meal_type: MealType,
    pub needs_review: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealItem {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub source: ItemSource,
    pub confidence: Option<f64>,
    pub created_at: OffsetDateTime,
}

/// (user, day) pre-image of the bucket an item mutation touches. Resolved
/// before deletes, while the parent rows still exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRef {
    pub user_id: Uuid,
    pub meal_date: Date,
}
