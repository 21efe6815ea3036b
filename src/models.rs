// src/models.rs
use crate::errors::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_IMAGE_STYLE: &str =
    "high-quality social media image, professional, vibrant, detailed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Instagram,
    Twitter,
    LinkedIn,
    Facebook,
}

impl Platform {
    // Static caption guidelines substituted into the generation prompt.
    pub fn guideline(&self) -> &'static str {
        match self {
            Platform::Instagram => "engaging, hashtag-friendly, 150-200 characters, visually focused",
            Platform::Twitter => "concise, witty, under 280 characters, punchy",
            Platform::LinkedIn => "professional, informative, 100-150 words, value-driven",
            Platform::Facebook => "conversational, story-driven, 100-200 words, relatable",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Instagram => "Instagram",
            Platform::Twitter => "Twitter",
            Platform::LinkedIn => "LinkedIn",
            Platform::Facebook => "Facebook",
        };
        f.write_str(name)
    }
}

impl FromStr for Platform {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Instagram" => Ok(Platform::Instagram),
            "Twitter" => Ok(Platform::Twitter),
            "LinkedIn" => Ok(Platform::LinkedIn),
            "Facebook" => Ok(Platform::Facebook),
            other => Err(PipelineError::UnknownPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Professional,
    Casual,
    Humorous,
    Inspirational,
    Promotional,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tone::Professional => "Professional",
            Tone::Casual => "Casual",
            Tone::Humorous => "Humorous",
            Tone::Inspirational => "Inspirational",
            Tone::Promotional => "Promotional",
        };
        f.write_str(name)
    }
}

impl FromStr for Tone {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Professional" => Ok(Tone::Professional),
            "Casual" => Ok(Tone::Casual),
            "Humorous" => Ok(Tone::Humorous),
            "Inspirational" => Ok(Tone::Inspirational),
            "Promotional" => Ok(Tone::Promotional),
            other => Err(PipelineError::UnknownTone(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedImage {
    pub fn new(filename: String, content_type: String, data: Vec<u8>) -> Self {
        Self {
            filename,
            content_type,
            data,
            uploaded_at: Utc::now(),
        }
    }
}

/// Decoded, downscaled, JPEG re-encoded payload ready for the vision API.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Opaque analysis text from the vision model. Downstream stages pass it
/// whole and never parse its internal structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult(pub String);

impl AnalysisResult {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub analysis: AnalysisResult,
    pub platform: Platform,
    pub tone: Tone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCaption {
    pub text: String,
    pub platform: Platform,
    pub tone: Tone,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ImagePromptRequest {
    pub analysis: AnalysisResult,
    pub style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImagePrompt {
    pub text: String,
    pub style: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SynthesizedImage {
    pub data: Vec<u8>,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Per-session pipeline state. Each field transitions absent -> present
/// independently; a new image invalidates everything downstream.
#[derive(Debug)]
pub struct PipelineSession {
    pub id: Uuid,
    pub image: Option<UploadedImage>,
    pub image_version: u64,
    pub analysis: Option<AnalysisResult>,
    pub caption: Option<GeneratedCaption>,
    pub image_prompt: Option<GeneratedImagePrompt>,
    pub synthesized: Option<SynthesizedImage>,
    pub created_at: DateTime<Utc>,
}

impl PipelineSession {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            image: None,
            image_version: 0,
            analysis: None,
            caption: None,
            image_prompt: None,
            synthesized: None,
            created_at: Utc::now(),
        }
    }

    pub fn submit_image(&mut self, image: UploadedImage) {
        self.image = Some(image);
        self.image_version += 1;
        self.analysis = None;
        self.caption = None;
        self.image_prompt = None;
        self.synthesized = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            has_image: self.image.is_some(),
            filename: self.image.as_ref().map(|i| i.filename.clone()),
            uploaded_at: self.image.as_ref().map(|i| i.uploaded_at),
            analysis: self.analysis.as_ref().map(|a| a.0.clone()),
            caption: self.caption.clone(),
            image_prompt: self.image_prompt.clone(),
            has_synthesized_image: self.synthesized.is_some(),
            created_at: self.created_at,
        }
    }
}

/// Read-only session view returned by the HTTP API. Binary payloads are
/// reduced to presence flags; the rendered image has its own endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub has_image: bool,
    pub filename: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub analysis: Option<String>,
    pub caption: Option<GeneratedCaption>,
    pub image_prompt: Option<GeneratedImagePrompt>,
    pub has_synthesized_image: bool,
    pub created_at: DateTime<Utc>,
}
