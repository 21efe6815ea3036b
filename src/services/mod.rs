// src/services/mod.rs
pub mod image_processor;
pub mod synthesis_service;
pub mod text_service;
pub mod vision_service;

pub use image_processor::ImagePreprocessor;
pub use synthesis_service::SynthesisService;
pub use text_service::TextService;
pub use vision_service::VisionService;

use crate::errors::PipelineError;
use crate::models::{
    AnalysisResult, CaptionRequest, GeneratedCaption, GeneratedImagePrompt, ImagePromptRequest,
    NormalizedImage, SynthesizedImage,
};
use async_trait::async_trait;

// Client seams. The orchestrator only ever talks to the remote APIs through
// these, so the pipeline can be driven without a network.

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, image: &NormalizedImage) -> Result<AnalysisResult, PipelineError>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn caption(&self, request: &CaptionRequest) -> Result<GeneratedCaption, PipelineError>;

    async fn image_prompt(
        &self,
        request: &ImagePromptRequest,
    ) -> Result<GeneratedImagePrompt, PipelineError>;
}

#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        prompt: &GeneratedImagePrompt,
    ) -> Result<SynthesizedImage, PipelineError>;
}
