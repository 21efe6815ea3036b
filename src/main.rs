// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::info;
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod pipeline;
mod services;

use crate::config::Config;
use crate::handlers::{
    analyze, caption, get_session, get_synthesized_image, image_prompt, resubmit_image,
    synthesize, upload_image,
};
use crate::pipeline::Orchestrator;
use crate::services::{SynthesisService, TextService, VisionService};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting captionforge service...");

    let config = Config::from_env()?;

    let vision = Arc::new(VisionService::new(
        config.gemini_api_key.clone(),
        config.gemini_api_url.clone(),
    )?);
    let text = Arc::new(TextService::new(
        config.gemini_api_key.clone(),
        config.gemini_api_url.clone(),
    )?);
    let synthesizer = Arc::new(SynthesisService::new(
        config.hf_api_key.clone(),
        config.hf_api_url.clone(),
    )?);

    let orchestrator = Arc::new(Orchestrator::new(
        vision,
        text,
        synthesizer,
        config.max_upload_bytes,
        config.max_dimension,
    ));

    let app_state = AppState { orchestrator };

    info!("Starting HTTP server on {}", config.bind_addr);
    let bind_addr = config.bind_addr.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .service(
                web::scope("/api/v1")
                    .route("/upload", web::post().to(upload_image))
                    .route("/sessions/{session_id}/upload", web::post().to(resubmit_image))
                    .route("/sessions/{session_id}/analyze", web::post().to(analyze))
                    .route("/sessions/{session_id}/caption", web::post().to(caption))
                    .route(
                        "/sessions/{session_id}/image-prompt",
                        web::post().to(image_prompt),
                    )
                    .route(
                        "/sessions/{session_id}/synthesize",
                        web::post().to(synthesize),
                    )
                    .route("/sessions/{session_id}", web::get().to(get_session))
                    .route(
                        "/sessions/{session_id}/image",
                        web::get().to(get_synthesized_image),
                    ),
            )
            .route("/health", web::get().to(health_check))
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "captionforge",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
