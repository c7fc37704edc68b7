use serde::Deserialize;

/// One food candidate returned by the vision API.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectedFood {
    pub name: String,
    pub calories: f64,
    pub confidence: f64,
}

impl DetectedFood {
    /// The API occasionally returns confidences slightly outside [0,1];
    /// clamp before they hit the CHECK constraint.
    pub fn clamped(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        if self.calories < 0.0 {
            self.calories = 0.0;
        }
        self
    }
}

/// Result contract of a recognition call: either a non-empty candidate list
/// or an explicit nothing-detected outcome the caller must handle by saving
/// the meal without items and flagging it for review.
#[derive(Debug)]
pub enum RecognitionOutcome {
    Detected(Vec<DetectedFood>),
    NothingDetected,
}

/// Wire shape of the recognizer response body.
#[derive(Debug, Deserialize)]
pub(crate) struct RecognizeResponse {
    #[serde(default)]
    pub foods: Vec<DetectedFood>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_confidence_and_calories() {
        let food = DetectedFood {
            name: "oatmeal".into(),
            calories: -5.0,
            confidence: 1.3,
        }
        .clamped();
        assert_eq!(food.calories, 0.0);
        assert_eq!(food.confidence, 1.0);
    }

    #[test]
    fn response_parses_with_missing_foods_field() {
        let parsed: RecognizeResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.foods.is_empty());
    }

    #[test]
    fn response_parses_candidate_list() {
        let body = r#"{"foods":[{"name":"banana","calories":105.0,"confidence":0.92}]}"#;
        let parsed: RecognizeResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.foods.len(), 1);
        assert_eq!(parsed.foods[0].name, "banana");
        assert_eq!(parsed.foods[0].calories, 105.0);
    }
}
