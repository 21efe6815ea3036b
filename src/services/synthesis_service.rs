// src/services/synthesis_service.rs
use crate::errors::PipelineError;
use crate::models::{GeneratedImagePrompt, SynthesizedImage};
use crate::services::ImageSynthesizer;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;

// Synthesis is the slow call; the model itself can take tens of seconds.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

pub struct SynthesisService {
    api_key: String,
    api_url: String,
    client: Client,
}

impl SynthesisService {
    pub fn new(api_key: String, api_url: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build synthesis HTTP client")?;
        Ok(Self {
            api_key,
            api_url,
            client,
        })
    }

    /// Classifies a raw synthesis response. 503 is the warm-up state and the
    /// only retryable failure; a JSON body on any status is a structured
    /// upstream error; a 200 body must decode as an image.
    fn interpret(
        status: StatusCode,
        content_type: &str,
        body: Bytes,
    ) -> Result<SynthesizedImage, PipelineError> {
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(PipelineError::ModelWarmingUp);
        }

        if content_type.starts_with("application/json") {
            let detail = match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(value) => value.to_string(),
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(PipelineError::UpstreamSynthesis {
                status: Some(status.as_u16()),
                detail,
            });
        }

        if status != StatusCode::OK {
            return Err(PipelineError::UpstreamSynthesis {
                status: Some(status.as_u16()),
                detail: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        image::load_from_memory(&body).map_err(|e| {
            PipelineError::MalformedResponse(format!("response body is not an image: {}", e))
        })?;

        let content_type = match image::guess_format(&body) {
            Ok(image::ImageFormat::Png) => "image/png",
            Ok(image::ImageFormat::Jpeg) => "image/jpeg",
            Ok(image::ImageFormat::WebP) => "image/webp",
            _ => "application/octet-stream",
        };

        Ok(SynthesizedImage {
            data: body.to_vec(),
            content_type: content_type.to_string(),
            created_at: chrono::Utc::now(),
        })
    }
}

#[async_trait]
impl ImageSynthesizer for SynthesisService {
    async fn synthesize(
        &self,
        prompt: &GeneratedImagePrompt,
    ) -> Result<SynthesizedImage, PipelineError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "inputs": prompt.text,
                "options": { "wait_for_model": true }
            }))
            .send()
            .await
            .map_err(|e| PipelineError::UpstreamSynthesis {
                status: None,
                detail: format!("request failed: {}", e),
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| PipelineError::UpstreamSynthesis {
                status: Some(status.as_u16()),
                detail: format!("failed to read response body: {}", e),
            })?;

        Self::interpret(status, &content_type, body)
    }
}
