use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::config::RecognizerConfig;

use super::dto::{RecognitionOutcome, RecognizeResponse};

#[async_trait]
pub trait FoodRecognizer: Send + Sync {
    /// Submit an image for food detection. Transport and API failures come
    /// back as `Err`; a successful call with zero candidates is
    /// `NothingDetected`, not an error.
    async fn recognize(&self, image: Bytes, content_type: &str)
        -> anyhow::Result<RecognitionOutcome>;
}

pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpRecognizer {
    pub fn new(cfg: &RecognizerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build recognizer http client")?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl FoodRecognizer for HttpRecognizer {
    async fn recognize(
        &self,
        image: Bytes,
        content_type: &str,
    ) -> anyhow::Result<RecognitionOutcome> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(image)
            .send()
            .await
            .context("recognizer request")?
            .error_for_status()
            .context("recognizer status")?;

        let body: RecognizeResponse = resp.json().await.context("recognizer response body")?;
        debug!(candidates = body.foods.len(), "recognizer returned");

        if body.foods.is_empty() {
            return Ok(RecognitionOutcome::NothingDetected);
        }
        Ok(RecognitionOutcome::Detected(
            body.foods.into_iter().map(|f| f.clamped()).collect(),
        ))
    }
}
