// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Image too large: {size} bytes (maximum {max} bytes)")]
    OversizedInput { size: usize, max: usize },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Unknown tone: {0}")]
    UnknownTone(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Stage not ready: {0}")]
    StageNotReady(&'static str),

    #[error("Vision analysis failed: {0}")]
    UpstreamAnalysis(String),

    #[error("Text generation failed: {0}")]
    UpstreamGeneration(String),

    #[error("Image synthesis failed (status {status:?}): {detail}")]
    UpstreamSynthesis { status: Option<u16>, detail: String },

    #[error("Synthesis model is still loading; retry in 20-30 seconds")]
    ModelWarmingUp,

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

impl PipelineError {
    // Only the warm-up state is worth retrying without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ModelWarmingUp)
    }

    fn kind(&self) -> &'static str {
        match self {
            PipelineError::OversizedInput { .. } => "oversized_input",
            PipelineError::UnsupportedFormat(_) => "unsupported_format",
            PipelineError::UnknownPlatform(_) => "unknown_platform",
            PipelineError::UnknownTone(_) => "unknown_tone",
            PipelineError::SessionNotFound(_) => "session_not_found",
            PipelineError::StageNotReady(_) => "stage_not_ready",
            PipelineError::UpstreamAnalysis(_) => "upstream_analysis",
            PipelineError::UpstreamGeneration(_) => "upstream_generation",
            PipelineError::UpstreamSynthesis { .. } => "upstream_synthesis",
            PipelineError::ModelWarmingUp => "model_warming_up",
            PipelineError::MalformedResponse(_) => "malformed_response",
            PipelineError::ImageProcessing(_) => "image_processing",
        }
    }
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::OversizedInput { .. }
            | PipelineError::UnsupportedFormat(_)
            | PipelineError::UnknownPlatform(_)
            | PipelineError::UnknownTone(_) => StatusCode::BAD_REQUEST,
            PipelineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::StageNotReady(_) => StatusCode::CONFLICT,
            PipelineError::UpstreamAnalysis(_)
            | PipelineError::UpstreamGeneration(_)
            | PipelineError::UpstreamSynthesis { .. }
            | PipelineError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            PipelineError::ImageProcessing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::ModelWarmingUp => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
            "retryable": self.is_retryable()
        }))
    }
}
