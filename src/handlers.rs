// src/handlers.rs
use crate::{AppState, errors::PipelineError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use serde::Deserialize;
use uuid::Uuid;

async fn read_image_field(payload: &mut Multipart) -> Result<UploadedImage, Error> {
    while let Some(mut field) = payload.try_next().await? {
        let content_disposition = field.content_disposition();
        let Some(filename) = content_disposition.get_filename().map(|f| f.to_string()) else {
            continue;
        };

        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        return Ok(UploadedImage::new(filename, content_type, data));
    }

    Err(actix_web::error::ErrorBadRequest("no file field in upload"))
}

pub async fn upload_image(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = Uuid::new_v4();
    let image = read_image_field(&mut payload).await?;
    let (size, content_type) = (image.data.len(), image.content_type.clone());

    data.orchestrator.submit_image(session_id, image).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "size": size,
        "content_type": content_type
    })))
}

pub async fn resubmit_image(
    path: web::Path<Uuid>,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let image = read_image_field(&mut payload).await?;
    let (size, content_type) = (image.data.len(), image.content_type.clone());

    // Invalidates analysis, caption, prompt and synthesized image.
    data.orchestrator.submit_image(session_id, image).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "size": size,
        "content_type": content_type
    })))
}

pub async fn analyze(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, PipelineError> {
    let session_id = path.into_inner();
    let analysis = data.orchestrator.run_analysis(session_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "analysis": analysis.as_str()
    })))
}

#[derive(Debug, Deserialize)]
pub struct CaptionParams {
    pub platform: String,
    pub tone: String,
}

pub async fn caption(
    path: web::Path<Uuid>,
    body: web::Json<CaptionParams>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, PipelineError> {
    let session_id = path.into_inner();
    // Reject unknown values before anything reaches the text API.
    let platform: Platform = body.platform.parse()?;
    let tone: Tone = body.tone.parse()?;

    let caption = data.orchestrator.run_caption(session_id, platform, tone).await?;
    Ok(HttpResponse::Ok().json(&caption))
}

#[derive(Debug, Deserialize)]
pub struct ImagePromptParams {
    pub style: Option<String>,
}

pub async fn image_prompt(
    path: web::Path<Uuid>,
    body: web::Json<ImagePromptParams>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, PipelineError> {
    let session_id = path.into_inner();
    let style = body
        .style
        .clone()
        .unwrap_or_else(|| DEFAULT_IMAGE_STYLE.to_string());

    let prompt = data.orchestrator.run_image_prompt(session_id, style).await?;
    Ok(HttpResponse::Ok().json(&prompt))
}

pub async fn synthesize(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, PipelineError> {
    let session_id = path.into_inner();
    let image = data.orchestrator.run_synthesis(session_id).await?;

    Ok(HttpResponse::Ok()
        .content_type(image.content_type)
        .body(image.data))
}

pub async fn get_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, PipelineError> {
    let session_id = path.into_inner();
    let snapshot = data.orchestrator.snapshot(session_id).await?;
    Ok(HttpResponse::Ok().json(&snapshot))
}

pub async fn get_synthesized_image(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, PipelineError> {
    let session_id = path.into_inner();
    let image = data.orchestrator.synthesized_image(session_id).await?;

    Ok(HttpResponse::Ok()
        .content_type(image.content_type)
        .body(image.data))
}
