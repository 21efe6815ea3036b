// src/config.rs
use anyhow::Context;
use std::env;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MAX_DIMENSION: u32 = 512;

const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
const DEFAULT_HF_API_URL: &str =
    "https://router.huggingface.co/hf-inference/models/stabilityai/stable-diffusion-xl-base-1.0";

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub hf_api_key: String,
    pub gemini_api_url: String,
    pub hf_api_url: String,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub max_dimension: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let gemini_api_key =
            env::var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?;
        let hf_api_key = env::var("HF_API_KEY").context("HF_API_KEY must be set")?;

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(v) => v.parse().context("MAX_UPLOAD_BYTES must be an integer")?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };
        let max_dimension = match env::var("MAX_IMAGE_DIMENSION") {
            Ok(v) => v.parse().context("MAX_IMAGE_DIMENSION must be an integer")?,
            Err(_) => DEFAULT_MAX_DIMENSION,
        };

        Ok(Self {
            gemini_api_key,
            hf_api_key,
            gemini_api_url: env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_API_URL.to_string()),
            hf_api_url: env::var("HF_API_URL").unwrap_or_else(|_| DEFAULT_HF_API_URL.to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            max_upload_bytes,
            max_dimension,
        })
    }
}
