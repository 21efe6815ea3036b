// src/pipeline.rs
use crate::errors::PipelineError;
use crate::models::{
    AnalysisResult, CaptionRequest, GeneratedCaption, GeneratedImagePrompt, ImagePromptRequest,
    PipelineSession, Platform, SessionSnapshot, SynthesizedImage, Tone, UploadedImage,
};
use crate::services::{ImagePreprocessor, ImageSynthesizer, TextGenerator, VisionAnalyzer};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Sequences the pipeline stages over per-session state. Remote calls are
/// awaited outside the session lock; commits re-take the lock and are
/// discarded if a newer image was submitted in the meantime, so a stale
/// in-flight result can never populate state for the wrong image.
pub struct Orchestrator {
    preprocessor: ImagePreprocessor,
    vision: Arc<dyn VisionAnalyzer>,
    text: Arc<dyn TextGenerator>,
    synthesizer: Arc<dyn ImageSynthesizer>,
    max_upload_bytes: usize,
    max_dimension: u32,
    sessions: RwLock<HashMap<Uuid, PipelineSession>>,
}

impl Orchestrator {
    pub fn new(
        vision: Arc<dyn VisionAnalyzer>,
        text: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn ImageSynthesizer>,
        max_upload_bytes: usize,
        max_dimension: u32,
    ) -> Self {
        Self {
            preprocessor: ImagePreprocessor::new(),
            vision,
            text,
            synthesizer,
            max_upload_bytes,
            max_dimension,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Stores a new image for the session, creating the session if needed.
    /// Everything derived from the previous image is cleared.
    pub async fn submit_image(&self, session_id: Uuid, image: UploadedImage) {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id)
            .or_insert_with(|| PipelineSession::new(session_id));
        session.submit_image(image);
        info!(
            "session {}: image submitted (version {})",
            session_id, session.image_version
        );
    }

    pub async fn run_analysis(&self, session_id: Uuid) -> Result<AnalysisResult, PipelineError> {
        let (version, upload) = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(&session_id)
                .ok_or(PipelineError::SessionNotFound(session_id))?;
            let upload = session
                .image
                .clone()
                .ok_or(PipelineError::StageNotReady("no image has been uploaded"))?;
            (session.image_version, upload)
        };

        // Validation failures surface here, before any remote call.
        let normalized =
            self.preprocessor
                .normalize(&upload, self.max_upload_bytes, self.max_dimension)?;
        let analysis = self.vision.analyze(&normalized).await?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(PipelineError::SessionNotFound(session_id))?;
        if session.image_version != version {
            warn!(
                "session {}: discarding stale analysis (image changed mid-flight)",
                session_id
            );
            return Err(PipelineError::StageNotReady(
                "image changed while analysis was in flight",
            ));
        }
        session.analysis = Some(analysis.clone());
        // A fresh analysis invalidates everything derived from the old one.
        session.caption = None;
        session.image_prompt = None;
        session.synthesized = None;
        Ok(analysis)
    }

    pub async fn run_caption(
        &self,
        session_id: Uuid,
        platform: Platform,
        tone: Tone,
    ) -> Result<GeneratedCaption, PipelineError> {
        let (version, analysis) = self.current_analysis(session_id).await?;

        let request = CaptionRequest {
            analysis,
            platform,
            tone,
        };
        let caption = self.text.caption(&request).await?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(PipelineError::SessionNotFound(session_id))?;
        if session.image_version != version {
            return Err(PipelineError::StageNotReady(
                "image changed while captioning was in flight",
            ));
        }
        session.caption = Some(caption.clone());
        Ok(caption)
    }

    pub async fn run_image_prompt(
        &self,
        session_id: Uuid,
        style: String,
    ) -> Result<GeneratedImagePrompt, PipelineError> {
        let (version, analysis) = self.current_analysis(session_id).await?;

        let request = ImagePromptRequest { analysis, style };
        let prompt = self.text.image_prompt(&request).await?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(PipelineError::SessionNotFound(session_id))?;
        if session.image_version != version {
            return Err(PipelineError::StageNotReady(
                "image changed while prompt generation was in flight",
            ));
        }
        // A rendered image belongs to the prompt it came from.
        session.image_prompt = Some(prompt.clone());
        session.synthesized = None;
        Ok(prompt)
    }

    pub async fn run_synthesis(&self, session_id: Uuid) -> Result<SynthesizedImage, PipelineError> {
        let (version, prompt) = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(&session_id)
                .ok_or(PipelineError::SessionNotFound(session_id))?;
            let prompt = session.image_prompt.clone().ok_or(PipelineError::StageNotReady(
                "no image prompt has been generated",
            ))?;
            (session.image_version, prompt)
        };

        let synthesized = self.synthesizer.synthesize(&prompt).await?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(PipelineError::SessionNotFound(session_id))?;
        if session.image_version != version {
            return Err(PipelineError::StageNotReady(
                "image changed while synthesis was in flight",
            ));
        }
        session.synthesized = Some(synthesized.clone());
        Ok(synthesized)
    }

    pub async fn snapshot(&self, session_id: Uuid) -> Result<SessionSnapshot, PipelineError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .map(|s| s.snapshot())
            .ok_or(PipelineError::SessionNotFound(session_id))
    }

    pub async fn synthesized_image(
        &self,
        session_id: Uuid,
    ) -> Result<SynthesizedImage, PipelineError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&session_id)
            .ok_or(PipelineError::SessionNotFound(session_id))?;
        session
            .synthesized
            .clone()
            .ok_or(PipelineError::StageNotReady("no image has been synthesized"))
    }

    async fn current_analysis(
        &self,
        session_id: Uuid,
    ) -> Result<(u64, AnalysisResult), PipelineError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&session_id)
            .ok_or(PipelineError::SessionNotFound(session_id))?;
        let analysis = session
            .analysis
            .clone()
            .ok_or(PipelineError::StageNotReady("analysis has not been run"))?;
        Ok((session.image_version, analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_IMAGE_STYLE, NormalizedImage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    const MAX_BYTES: usize = 5 * 1024 * 1024;
    const MAX_DIM: u32 = 512;

    fn jpeg_upload(width: u32, height: u32) -> UploadedImage {
        let buf = image::RgbImage::from_pixel(width, height, image::Rgb([30, 90, 160]));
        let mut data = Vec::new();
        image::DynamicImage::ImageRgb8(buf)
            .write_to(
                &mut std::io::Cursor::new(&mut data),
                image::ImageOutputFormat::Jpeg(90),
            )
            .unwrap();
        UploadedImage::new("photo.jpg".into(), "image/jpeg".into(), data)
    }

    struct OkVision;

    #[async_trait]
    impl VisionAnalyzer for OkVision {
        async fn analyze(&self, _image: &NormalizedImage) -> Result<AnalysisResult, PipelineError> {
            Ok(AnalysisResult("subject: a blue square".into()))
        }
    }

    struct FailVision;

    #[async_trait]
    impl VisionAnalyzer for FailVision {
        async fn analyze(&self, _image: &NormalizedImage) -> Result<AnalysisResult, PipelineError> {
            Err(PipelineError::UpstreamAnalysis("connection reset".into()))
        }
    }

    /// Signals `entered` when called, then blocks until `release` has a
    /// permit. Lets a test hold an analysis call in flight deterministically.
    struct GatedVision {
        entered: Semaphore,
        release: Semaphore,
    }

    impl GatedVision {
        fn new() -> Self {
            Self {
                entered: Semaphore::new(0),
                release: Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl VisionAnalyzer for GatedVision {
        async fn analyze(&self, _image: &NormalizedImage) -> Result<AnalysisResult, PipelineError> {
            self.entered.add_permits(1);
            let _permit = self.release.acquire().await.unwrap();
            Ok(AnalysisResult("analysis of the old image".into()))
        }
    }

    /// Plays back a scripted sequence of caption outcomes.
    struct ScriptedText {
        captions: Mutex<VecDeque<Result<String, PipelineError>>>,
    }

    impl ScriptedText {
        fn new(captions: Vec<Result<String, PipelineError>>) -> Self {
            Self {
                captions: Mutex::new(captions.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedText {
        async fn caption(
            &self,
            request: &CaptionRequest,
        ) -> Result<GeneratedCaption, PipelineError> {
            let next = self
                .captions
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected caption call");
            next.map(|text| GeneratedCaption {
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
            Ok(GeneratedImagePrompt {
                text: format!("render: {}", request.analysis.as_str()),
                style: request.style.clone(),
                created_at: chrono::Utc::now(),
            })
        }
    }

    fn ok_text() -> Arc<ScriptedText> {
        Arc::new(ScriptedText::new(vec![Ok(
            "Sunset vibes! #golden #evening".into()
        )]))
    }

    /// Scripted synthesizer outcomes; Ok(()) yields a fixed image.
    struct ScriptedSynth {
        outcomes: Mutex<VecDeque<Result<(), PipelineError>>>,
    }

    impl ScriptedSynth {
        fn new(outcomes: Vec<Result<(), PipelineError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl ImageSynthesizer for ScriptedSynth {
        async fn synthesize(
            &self,
            _prompt: &GeneratedImagePrompt,
        ) -> Result<SynthesizedImage, PipelineError> {
            let next = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected synthesize call");
            next.map(|_| SynthesizedImage {
                data: vec![0xFF, 0xD8, 0xFF],
                content_type: "image/jpeg".into(),
                created_at: chrono::Utc::now(),
            })
        }
    }

    fn orchestrator(
        vision: Arc<dyn VisionAnalyzer>,
        text: Arc<dyn TextGenerator>,
        synth: Arc<dyn ImageSynthesizer>,
    ) -> Orchestrator {
        Orchestrator::new(vision, text, synth, MAX_BYTES, MAX_DIM)
    }

    #[tokio::test]
    async fn happy_path_analysis_then_caption() {
        let orch = orchestrator(
            Arc::new(OkVision),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![])),
        );
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(800, 600)).await;

        let analysis = orch.run_analysis(id).await.unwrap();
        assert_eq!(analysis.as_str(), "subject: a blue square");

        let caption = orch
            .run_caption(id, Platform::Instagram, Tone::Casual)
            .await
            .unwrap();
        assert_eq!(caption.platform, Platform::Instagram);

        let snap = orch.snapshot(id).await.unwrap();
        assert!(snap.has_image);
        assert!(snap.analysis.is_some());
        assert_eq!(snap.caption.unwrap().text, "Sunset vibes! #golden #evening");
        assert!(snap.image_prompt.is_none());
        assert!(!snap.has_synthesized_image);
    }

    #[tokio::test]
    async fn oversized_upload_fails_analysis_and_leaves_session_untouched() {
        let orch = orchestrator(
            Arc::new(OkVision),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![])),
        );
        let id = Uuid::new_v4();
        // 6 MiB of garbage declared as PNG; the size gate fires before decode.
        orch.submit_image(
            id,
            UploadedImage::new("big.png".into(), "image/png".into(), vec![0u8; 6 * 1024 * 1024]),
        )
        .await;

        let err = orch.run_analysis(id).await.unwrap_err();
        assert!(matches!(err, PipelineError::OversizedInput { .. }));

        let snap = orch.snapshot(id).await.unwrap();
        assert!(snap.analysis.is_none());
        assert!(snap.caption.is_none());
        assert!(snap.image_prompt.is_none());
        assert!(!snap.has_synthesized_image);
    }

    #[tokio::test]
    async fn warm_up_leaves_state_absent_and_retry_succeeds() {
        let orch = orchestrator(
            Arc::new(OkVision),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![
                Err(PipelineError::ModelWarmingUp),
                Ok(()),
            ])),
        );
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(200, 200)).await;
        orch.run_analysis(id).await.unwrap();
        orch.run_image_prompt(id, DEFAULT_IMAGE_STYLE.into())
            .await
            .unwrap();

        let err = orch.run_synthesis(id).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!orch.snapshot(id).await.unwrap().has_synthesized_image);

        // User-initiated retry of the same stage.
        orch.run_synthesis(id).await.unwrap();
        assert!(orch.snapshot(id).await.unwrap().has_synthesized_image);
        let image = orch.synthesized_image(id).await.unwrap();
        assert_eq!(image.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn caption_failure_preserves_analysis() {
        let orch = orchestrator(
            Arc::new(OkVision),
            Arc::new(ScriptedText::new(vec![Err(
                PipelineError::UpstreamGeneration("connection refused".into()),
            )])),
            Arc::new(ScriptedSynth::new(vec![])),
        );
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(300, 300)).await;
        orch.run_analysis(id).await.unwrap();

        let err = orch
            .run_caption(id, Platform::Twitter, Tone::Humorous)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamGeneration(_)));

        let snap = orch.snapshot(id).await.unwrap();
        assert!(snap.analysis.is_some());
        assert!(snap.caption.is_none());
    }

    #[tokio::test]
    async fn failed_recaption_keeps_previous_caption() {
        let orch = orchestrator(
            Arc::new(OkVision),
            Arc::new(ScriptedText::new(vec![
                Ok("first caption".into()),
                Err(PipelineError::UpstreamGeneration("timed out".into())),
            ])),
            Arc::new(ScriptedSynth::new(vec![])),
        );
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(300, 300)).await;
        orch.run_analysis(id).await.unwrap();

        orch.run_caption(id, Platform::LinkedIn, Tone::Professional)
            .await
            .unwrap();
        let err = orch
            .run_caption(id, Platform::LinkedIn, Tone::Professional)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamGeneration(_)));

        let snap = orch.snapshot(id).await.unwrap();
        assert_eq!(snap.caption.unwrap().text, "first caption");
    }

    #[tokio::test]
    async fn analysis_failure_stores_nothing() {
        let orch = orchestrator(
            Arc::new(FailVision),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![])),
        );
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(300, 300)).await;

        let err = orch.run_analysis(id).await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamAnalysis(_)));
        assert!(orch.snapshot(id).await.unwrap().analysis.is_none());
    }

    #[tokio::test]
    async fn stale_analysis_discarded_after_reupload() {
        let vision = Arc::new(GatedVision::new());
        let orch = Arc::new(Orchestrator::new(
            vision.clone(),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![])),
            MAX_BYTES,
            MAX_DIM,
        ));
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(300, 300)).await;

        let task = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run_analysis(id).await })
        };

        // Wait until the analysis call is in flight, then replace the image.
        let _ = vision.entered.acquire().await.unwrap();
        orch.submit_image(id, jpeg_upload(400, 400)).await;
        vision.release.add_permits(1);

        let result = task.await.unwrap();
        assert!(matches!(result, Err(PipelineError::StageNotReady(_))));
        // The stale result must not populate state for the new image.
        assert!(orch.snapshot(id).await.unwrap().analysis.is_none());
    }

    #[tokio::test]
    async fn caption_requires_analysis() {
        let orch = orchestrator(
            Arc::new(OkVision),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![])),
        );
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(300, 300)).await;

        let err = orch
            .run_caption(id, Platform::Facebook, Tone::Promotional)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::StageNotReady(_)));
    }

    #[tokio::test]
    async fn synthesis_requires_prompt() {
        let orch = orchestrator(
            Arc::new(OkVision),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![Ok(())])),
        );
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(300, 300)).await;
        orch.run_analysis(id).await.unwrap();

        let err = orch.run_synthesis(id).await.unwrap_err();
        assert!(matches!(err, PipelineError::StageNotReady(_)));
    }

    #[tokio::test]
    async fn new_prompt_invalidates_previous_synthesized_image() {
        let orch = orchestrator(
            Arc::new(OkVision),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![Ok(())])),
        );
        let id = Uuid::new_v4();
        orch.submit_image(id, jpeg_upload(300, 300)).await;
        orch.run_analysis(id).await.unwrap();
        orch.run_image_prompt(id, "oil painting".into()).await.unwrap();
        orch.run_synthesis(id).await.unwrap();
        assert!(orch.snapshot(id).await.unwrap().has_synthesized_image);

        orch.run_image_prompt(id, "pixel art".into()).await.unwrap();
        let snap = orch.snapshot(id).await.unwrap();
        assert_eq!(snap.image_prompt.unwrap().style, "pixel art");
        assert!(!snap.has_synthesized_image);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let orch = orchestrator(
            Arc::new(OkVision),
            ok_text(),
            Arc::new(ScriptedSynth::new(vec![])),
        );
        let err = orch.run_analysis(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PipelineError::SessionNotFound(_)));
    }
}
