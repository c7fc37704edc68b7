use bytes::Bytes;
use time::Date;
use tracing::warn;
use uuid::Uuid;

use crate::meals::repo::{self, NewItem, PhotoLink};
use crate::meals::repo_types::{ItemSource, Meal, MealItem, MealType};
use crate::photos;
use crate::recognition::RecognitionOutcome;
use crate::state::AppState;

#[derive(Debug)]
pub struct PhotoUpload {
    pub body: Bytes,
    pub content_type: String,
}

/// Map a recognizer call result to the items to insert plus the review flag.
/// Failures and empty detections save the meal without items, flagged for
/// manual review; neither aborts the write.
fn items_from_recognition(
    result: anyhow::Result<RecognitionOutcome>,
) -> (Vec<NewItem>, bool) {
    match result {
        Ok(RecognitionOutcome::Detected(foods)) => {
            let items = foods
                .into_iter()
                .map(|f| NewItem {
                    name: f.name,
                    calories: f.calories,
                    protein: 0.0,
                    carbs: 0.0,
                    fat: 0.0,
                    source: ItemSource::Detected,
                    confidence: Some(f.confidence),
                })
                .collect();
            (items, false)
        }
        Ok(RecognitionOutcome::NothingDetected) => {
            warn!("recognizer detected nothing, flagging meal for review");
            (Vec::new(), true)
        }
        Err(e) => {
            warn!(error = %e, "recognizer call failed, flagging meal for review");
            (Vec::new(), true)
        }
    }
}

/// Photo logging path: upload the image, ask the recognizer for candidates,
/// then persist the meal with its bucket rebuilt in the same transaction.
pub async fn log_meal_from_photo(
    st: &AppState,
    user_id: Uuid,
    meal_date: Date,
    meal_type: MealType,
    photo: PhotoUpload,
) -> anyhow::Result<(Meal, Vec<MealItem>)> {
    let (photo_id, key) =
        photos::services::upload_photo(st, user_id, photo.body.clone(), &photo.content_type)
            .await?;

    let result = st
        .recognizer
        .recognize(photo.body, &photo.content_type)
        .await;
    let (items, needs_review) = items_from_recognition(result);

    let (meal, items) = repo::create_meal(
        &st.db,
        user_id,
        meal_date,
        meal_type,
        &items,
        needs_review,
        Some(PhotoLink {
            photo_id,
            s3_key: &key,
            content_type: &photo.content_type,
        }),
    )
    .await?;

    Ok((meal, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::DetectedFood;

    #[test]
    fn detected_foods_become_detected_items() {
        let outcome = Ok(RecognitionOutcome::Detected(vec![DetectedFood {
            name: "banana".into(),
            calories: 105.0,
            confidence: 0.9,
        }]));
        let (items, needs_review) = items_from_recognition(outcome);
        assert!(!needs_review);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "banana");
        assert_eq!(items[0].calories, 105.0);
        assert_eq!(items[0].source, ItemSource::Detected);
        assert_eq!(items[0].confidence, Some(0.9));
    }

    #[test]
    fn empty_detection_flags_review_without_items() {
        let (items, needs_review) =
            items_from_recognition(Ok(RecognitionOutcome::NothingDetected));
        assert!(needs_review);
        assert!(items.is_empty());
    }

    #[test]
    fn recognizer_failure_flags_review_without_items() {
        let (items, needs_review) = items_from_recognition(Err(anyhow::anyhow!("vision api down")));
        assert!(needs_review);
        assert!(items.is_empty());
    }
}
