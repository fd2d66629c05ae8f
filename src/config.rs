// src/config.rs
use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub download_stagger: Duration,
    pub max_upload_dimension: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let parse_u64 = |key: &str, default: u64| -> Result<u64> {
            match non_empty(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}")),
                None => Ok(default),
            }
        };

        let max_upload_dimension = parse_u64("MAX_UPLOAD_DIMENSION", 4096)?;

        Ok(Self {
            bind_addr: non_empty("PRODUCTLENS_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")),
            request_timeout: Duration::from_secs(parse_u64("GEMINI_TIMEOUT_SECS", 120)?),
            download_stagger: Duration::from_millis(parse_u64("DOWNLOAD_STAGGER_MS", 400)?),
            max_upload_dimension: u32::try_from(max_upload_dimension)
                .context("MAX_UPLOAD_DIMENSION is too large")?,
        })
    }
}
