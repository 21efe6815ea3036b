// src/services/vision_service.rs
use crate::errors::PipelineError;
use crate::models::{AnalysisResult, NormalizedImage};
use crate::services::VisionAnalyzer;
use anyhow::Context;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Fixed instruction prompt; the same text is sent for every image so the
// request construction stays deterministic.
const ANALYSIS_PROMPT: &str = r#"Analyze this image in detail and provide:
1. Main subject/product - what is the primary focus?
2. Colors and mood - describe the color palette and emotional tone
3. Setting/background - describe the environment
4. Key visual elements - list important objects, people, or features
5. Suggested tone for social media post - what tone would work best?

Provide the analysis in a clear, structured format."#;

pub struct VisionService {
    api_key: String,
    api_url: String,
    client: Client,
}

impl VisionService {
    pub fn new(api_key: String, api_url: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build vision HTTP client")?;
        Ok(Self {
            api_key,
            api_url,
            client,
        })
    }
}

#[async_trait]
impl VisionAnalyzer for VisionService {
    async fn analyze(&self, image: &NormalizedImage) -> Result<AnalysisResult, PipelineError> {
        let base64_image = general_purpose::STANDARD.encode(&image.data);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "contents": [{
                    "parts": [
                        { "text": ANALYSIS_PROMPT },
                        {
                            "inline_data": {
                                "mime_type": "image/jpeg",
                                "data": base64_image
                            }
                        }
                    ]
                }]
            }))
            .send()
            .await
            .map_err(|e| PipelineError::UpstreamAnalysis(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::UpstreamAnalysis(format!(
                "vision API returned {}: {}",
                status, error_text
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::UpstreamAnalysis(format!("failed to parse response: {}", e)))?;

        let text = result["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                PipelineError::UpstreamAnalysis("no analysis text in response".to_string())
            })?;

        Ok(AnalysisResult(text.to_string()))
    }
}
