// src/services/text_service.rs
use crate::errors::PipelineError;
use crate::models::{
    CaptionRequest, GeneratedCaption, GeneratedImagePrompt, ImagePromptRequest,
};
use crate::services::TextGenerator;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TextService {
    api_key: String,
    api_url: String,
    client: Client,
}

impl TextService {
    pub fn new(api_key: String, api_url: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build text HTTP client")?;
        Ok(Self {
            api_key,
            api_url,
            client,
        })
    }

    fn caption_prompt(request: &CaptionRequest) -> String {
        let platform = request.platform;
        let tone = request.tone.to_string().to_lowercase();
        format!(
            r#"Based on this image analysis:

{analysis}

Create a {tone} social media caption for {platform}.

Guidelines for {platform}: {guideline}

The caption should include:
- An attention-grabbing opening
- The key message about the image
- A clear call-to-action
- 3-5 relevant hashtags

Make it {tone} in tone and optimized for {platform}."#,
            analysis = request.analysis.as_str(),
            tone = tone,
            platform = platform,
            guideline = platform.guideline(),
        )
    }

    fn image_prompt_prompt(request: &ImagePromptRequest) -> String {
        format!(
            r#"Based on this description:
{analysis}

Create a detailed image generation prompt for AI image generators (like DALL-E, Midjourney, Stable Diffusion).

The prompt should:
- Be specific and descriptive
- Include art style: {style}
- Specify mood and lighting
- Be optimized for social media (1:1 or 16:9 ratio)
- Be professional and visually appealing

Provide only the image prompt, nothing else."#,
            analysis = request.analysis.as_str(),
            style = request.style,
        )
    }

    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "contents": [{
                    "parts": [{ "text": prompt }]
                }]
            }))
            .send()
            .await
            .map_err(|e| PipelineError::UpstreamGeneration(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::UpstreamGeneration(format!(
                "text API returned {}: {}",
                status, error_text
            )));
        }

        let result: serde_json::Value = response.json().await.map_err(|e| {
            PipelineError::UpstreamGeneration(format!("failed to parse response: {}", e))
        })?;

        result["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PipelineError::UpstreamGeneration("no generated text in response".to_string())
            })
    }
}

#[async_trait]
impl TextGenerator for TextService {
    async fn caption(&self, request: &CaptionRequest) -> Result<GeneratedCaption, PipelineError> {
        let prompt = Self::caption_prompt(request);
        let text = self.generate(&prompt).await?;
        Ok(GeneratedCaption {
            text,
            platform: request.platform,
            tone: request.tone,
            created_at: chrono::Utc::now(),
        })
    }

    async fn image_prompt(
        &self,
        request: &ImagePromptRequest,
    ) -> Result<GeneratedImagePrompt, PipelineError> {
        let prompt = Self::image_prompt_prompt(request);
        let text = self.generate(&prompt).await?;
        Ok(GeneratedImagePrompt {
            text,
            style: request.style.clone(),
            created_at: chrono::Utc::now(),
        })
    }
}
