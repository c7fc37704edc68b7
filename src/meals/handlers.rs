use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, patch, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiError,
    meals::{
        dto::{
            parse_day, CreateManualMealRequest, CreatedMealResponse, ItemResponse, MealDetails,
            MealListItem, MealsQuery, NewItemRequest, UpdateItemRequest, UpdateMealRequest,
        },
        repo::{self, NewItem},
        repo_types::{ItemSource, Meal, MealItem, MealType},
        services::{self, PhotoUpload},
    },
    photos,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/:id", get(get_meal))
        .route("/meals/:id/photo", get(get_presigned_photo))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal_photo))
        .route("/meals/manual", post(create_meal_manual))
        .route("/meals/:id", patch(update_meal).delete(delete_meal))
        .route("/meals/:id/items", post(add_item))
        .route("/items/:id", patch(update_item).delete(delete_item))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

fn item_response(i: MealItem) -> ItemResponse {
    ItemResponse {
        id: i.id,
        name: i.name,
        calories: i.calories,
        protein: i.protein,
        carbs: i.carbs,
        fat: i.fat,
        source: i.source,
        confidence: i.confidence,
    }
}

fn created_response(meal: Meal, items: Vec<MealItem>) -> (StatusCode, HeaderMap, Json<CreatedMealResponse>) {
    let mut headers = HeaderMap::new();
    if let Ok(loc) = format!("/api/v1/meals/{}", meal.id).parse() {
        headers.insert(axum::http::header::LOCATION, loc);
    }
    (
        StatusCode::CREATED,
        headers,
        Json(CreatedMealResponse {
            id: meal.id,
            meal_date: meal.meal_date,
            meal_type: meal.meal_type,
            needs_review: meal.needs_review,
            items: items.into_iter().map(item_response).collect(),
        }),
    )
}

fn parse_meal_type(s: &str) -> Result<MealType, ApiError> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
        .map_err(|_| ApiError::validation(format!("invalid meal_type '{s}'")))
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<MealsQuery>,
) -> Result<Json<Vec<MealListItem>>, ApiError> {
    let date = q.date.as_deref().map(parse_day).transpose()?;
    let meals = repo::list_by_user(&state.db, user_id, date, q.limit, q.offset).await?;
    let items = meals
        .into_iter()
        .map(|m| MealListItem {
            id: m.id,
            meal_date: m.meal_date,
            meal_type: m.meal_type,
            needs_review: m.needs_review,
            created_at: m.created_at,
        })
        .collect();
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealDetails>, ApiError> {
    let meal = repo::get_owned(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("meal"))?;
    let items = repo::list_items(&state.db, id).await?;
    let keys = photos::repo::list_keys_by_meal(&state.db, id).await?;
    let photo_urls = photos::services::presign_many(&state, keys).await?;

    Ok(Json(MealDetails {
        id: meal.id,
        meal_date: meal.meal_date,
        meal_type: meal.meal_type,
        needs_review: meal.needs_review,
        created_at: meal.created_at,
        items: items.into_iter().map(item_response).collect(),
        photo_urls,
    }))
}

/// Decode the photo-meal form. A malformed multipart body is its own
/// validation error, not a misleading missing-field one.
async fn parse_photo_form(
    mut mp: Multipart,
) -> Result<(PhotoUpload, time::Date, MealType), ApiError> {
    let mut photo: Option<PhotoUpload> = None;
    let mut meal_date: Option<String> = None;
    let mut meal_type: Option<String> = None;

    loop {
        let field = match mp.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(ApiError::validation(format!("malformed multipart body: {e}")));
            }
        };
        let name = field.name().map(|s| s.to_string()).unwrap_or_default();
        match name.as_str() {
            "photo" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("unreadable photo field: {e}")))?;
                photo = Some(PhotoUpload { body, content_type });
            }
            "meal_date" => {
                meal_date = Some(field.text().await.map_err(|e| {
                    ApiError::validation(format!("unreadable meal_date field: {e}"))
                })?);
            }
            "meal_type" => {
                meal_type = Some(field.text().await.map_err(|e| {
                    ApiError::validation(format!("unreadable meal_type field: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let photo = photo.ok_or_else(|| ApiError::validation("photo field is required"))?;
    if photo.body.is_empty() {
        return Err(ApiError::validation("photo is empty"));
    }
    let meal_date = parse_day(
        meal_date
            .as_deref()
            .ok_or_else(|| ApiError::validation("meal_date field is required"))?,
    )?;
    let meal_type = parse_meal_type(
        meal_type
            .as_deref()
            .ok_or_else(|| ApiError::validation("meal_type field is required"))?,
    )?;

    Ok((photo, meal_date, meal_type))
}

/// POST /meals (multipart): one `photo` file plus `meal_date` and
/// `meal_type` fields.
#[instrument(skip(state, mp))]
pub async fn create_meal_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<CreatedMealResponse>), ApiError> {
    let (photo, meal_date, meal_type) = parse_photo_form(mp).await?;

    let (meal, items) =
        services::log_meal_from_photo(&state, user_id, meal_date, meal_type, photo).await?;
    Ok(created_response(meal, items))
}

/// POST /meals/manual: meal with hand-entered items, no photo.
#[instrument(skip(state, body))]
pub async fn create_meal_manual(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateManualMealRequest>,
) -> Result<(StatusCode, HeaderMap, Json<CreatedMealResponse>), ApiError> {
    let meal_date = parse_day(&body.meal_date)?;
    for item in &body.items {
        item.validate()?;
    }
    let items: Vec<NewItem> = body.items.iter().map(manual_item).collect();

    let (meal, items) = repo::create_meal(
        &state.db,
        user_id,
        meal_date,
        body.meal_type,
        &items,
        false,
        None,
    )
    .await?;
    Ok(created_response(meal, items))
}

fn manual_item(req: &NewItemRequest) -> NewItem {
    NewItem {
        name: req.name.trim().to_string(),
        calories: req.calories,
        protein: req.protein,
        carbs: req.carbs,
        fat: req.fat,
        source: ItemSource::Manual,
        confidence: None,
    }
}

#[instrument(skip(state, body))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMealRequest>,
) -> Result<Json<MealListItem>, ApiError> {
    let meal_date = body.meal_date.as_deref().map(parse_day).transpose()?;
    let meal = repo::update_meal(&state.db, user_id, id, meal_date, body.meal_type)
        .await?
        .ok_or(ApiError::NotFound("meal"))?;
    Ok(Json(MealListItem {
        id: meal.id,
        meal_date: meal.meal_date,
        meal_type: meal.meal_type,
        needs_review: meal.needs_review,
        created_at: meal.created_at,
    }))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !repo::delete_meal(&state.db, user_id, id).await? {
        return Err(ApiError::NotFound("meal"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(meal_id): Path<Uuid>,
    Json(body): Json<NewItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    body.validate()?;
    let item = repo::add_item(&state.db, user_id, meal_id, &manual_item(&body))
        .await?
        .ok_or(ApiError::NotFound("meal"))?;
    Ok((StatusCode::CREATED, Json(item_response(item))))
}

#[instrument(skip(state, body))]
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    body.validate()?;
    let item = repo::update_item(
        &state.db,
        user_id,
        item_id,
        body.name.as_deref().map(str::trim),
        body.calories,
        body.protein,
        body.carbs,
        body.fat,
    )
    .await?
    .ok_or(ApiError::NotFound("item"))?;
    Ok(Json(item_response(item)))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !repo::delete_item(&state.db, user_id, item_id).await? {
        return Err(ApiError::NotFound("item"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// 302 to a presigned URL of the meal's first photo.
#[instrument(skip(state))]
pub async fn get_presigned_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    if repo::get_owned(&state.db, user_id, id).await?.is_none() {
        return Err(ApiError::NotFound("meal"));
    }
    let key = photos::repo::first_key_by_meal(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("photo"))?;
    let url = photos::services::presign_one(&state, &key).await?;
    Ok(Redirect::temporary(&url).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_meal_type_accepts_known_slots() {
        assert_eq!(parse_meal_type("breakfast").unwrap(), MealType::Breakfast);
        assert_eq!(parse_meal_type("LUNCH").unwrap(), MealType::Lunch);
        assert_eq!(parse_meal_type(" dinner ").unwrap(), MealType::Dinner);
        assert_eq!(parse_meal_type("snack").unwrap(), MealType::Snack);
    }

    #[test]
    fn parse_meal_type_rejects_unknown() {
        assert!(parse_meal_type("brunch").is_err());
        assert!(parse_meal_type("").is_err());
    }
}

#[cfg(test)]
mod multipart_tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    const BOUNDARY: &str = "test-boundary";

    async fn multipart_from(body: String) -> Multipart {
        let req = Request::builder()
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(req, &()).await.unwrap()
    }

    fn text_field(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    }

    fn photo_field(bytes: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"m.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n{bytes}\r\n"
        )
    }

    #[tokio::test]
    async fn complete_form_parses() {
        let body = format!(
            "{}{}{}--{BOUNDARY}--\r\n",
            photo_field("jpegbytes"),
            text_field("meal_date", "2026-08-24"),
            text_field("meal_type", "lunch"),
        );
        let mp = multipart_from(body).await;
        let (photo, meal_date, meal_type) = parse_photo_form(mp).await.unwrap();
        assert_eq!(photo.body.as_ref(), b"jpegbytes");
        assert_eq!(photo.content_type, "image/jpeg");
        assert_eq!(meal_date.to_string(), "2026-08-24");
        assert_eq!(meal_type, MealType::Lunch);
    }

    #[tokio::test]
    async fn missing_photo_is_reported_as_missing() {
        let body = format!(
            "{}{}--{BOUNDARY}--\r\n",
            text_field("meal_date", "2026-08-24"),
            text_field("meal_type", "lunch"),
        );
        let mp = multipart_from(body).await;
        let err = parse_photo_form(mp).await.unwrap_err();
        assert!(err.to_string().contains("photo field is required"));
    }

    #[tokio::test]
    async fn malformed_body_is_not_reported_as_missing_photo() {
        // No terminating boundary: the decode itself fails.
        let mp = multipart_from("this is not a multipart payload".to_string()).await;
        let err = parse_photo_form(mp).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("malformed multipart body"), "got: {msg}");
    }
}
