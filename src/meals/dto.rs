use serde::{Deserialize, Serialize};
use time::{format_description::FormatItem, macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::meals::repo_types::{ItemSource, MealType};

const DAY_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parse a `YYYY-MM-DD` calendar day; rejected as a validation error before
/// any write when malformed.
pub fn parse_day(s: &str) -> Result<Date, ApiError> {
    Date::parse(s, DAY_FORMAT)
        .map_err(|_| ApiError::validation(format!("invalid date '{s}', expected YYYY-MM-DD")))
}

#[derive(Debug, Deserialize)]
pub struct NewItemRequest {
    pub name: String,
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
}

impl NewItemRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("item name is required"));
        }
        for (field, v) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ApiError::validation(format!("{field} must be non-negative")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateManualMealRequest {
    pub meal_date: String,
    pub meal_type: MealType,
    #[serde(default)]
    pub items: Vec<NewItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMealRequest {
    pub meal_date: Option<String>,
    pub meal_type: Option<MealType>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl UpdateItemRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ApiError::validation("item name cannot be empty"));
            }
        }
        for (field, v) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ] {
            if let Some(v) = v {
                if !v.is_finite() || v < 0.0 {
                    return Err(ApiError::validation(format!("{field} must be non-negative")));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub source: ItemSource,
    pub confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MealListItem {
    pub id: Uuid,
    pub meal_date: Date,
    pub meal_type: MealType,
    pub needs_review: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct MealDetails {
    pub id: Uuid,
    pub meal_date: Date,
    pub meal_type: MealType,
    pub needs_review: bool,
    pub created_at: OffsetDateTime,
    pub items: Vec<ItemResponse>,
    pub photo_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedMealResponse {
    pub id: Uuid,
    pub meal_date: Date,
    pub meal_type: MealType,
    pub needs_review: bool,
    pub items: Vec<ItemResponse>,
}

#[derive(Debug, Deserialize)]
pub struct MealsQuery {
    pub date: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_day_accepts_iso_date() {
        let day = parse_day("2026-08-24").unwrap();
        assert_eq!(day.to_string(), "2026-08-24");
    }

    #[test]
    fn parse_day_rejects_garbage() {
        assert!(parse_day("24/08/2026").is_err());
        assert!(parse_day("2026-13-01").is_err());
        assert!(parse_day("").is_err());
    }

    #[test]
    fn new_item_rejects_negative_calories() {
        let req = NewItemRequest {
            name: "toast".into(),
            calories: -1.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn meal_type_round_trips_lowercase() {
        let json = serde_json::to_string(&MealType::Breakfast).unwrap();
        assert_eq!(json, "\"breakfast\"");
        let back: MealType = serde_json::from_str("\"snack\"").unwrap();
        assert_eq!(back, MealType::Snack);
    }
}
