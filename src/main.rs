// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::{error, info, warn};
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::Config;
use crate::services::{
    BatchOrchestrator, CredentialStore, GeminiService, ImageProcessor, TranslationClient,
};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<BatchOrchestrator>,
    image_processor: Arc<ImageProcessor>,
    credentials: Arc<CredentialStore>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    info!("Starting ProductLens translation service...");

    let credentials = Arc::new(CredentialStore::new(config.api_key.clone()));
    if config.api_key.is_none() {
        warn!("No GEMINI_API_KEY configured; batches will wait for PUT /api/v1/credential");
    }

    let gemini = GeminiService::new(
        config.api_base.clone(),
        config.model.clone(),
        config.request_timeout,
        credentials.clone(),
    )
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let orchestrator = Arc::new(BatchOrchestrator::new(
        TranslationClient::new(Arc::new(gemini)),
        credentials.clone(),
        config.download_stagger,
    ));
    let image_processor = Arc::new(ImageProcessor::new(config.max_upload_dimension));

    let app_state = AppState {
        orchestrator,
        image_processor,
        credentials,
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
            .route("/health", web::get().to(health_check))
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "productlens",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
