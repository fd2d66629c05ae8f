// src/services/mod.rs
pub mod credentials;
pub mod gemini_service;
pub mod image_processor;
pub mod naming;
pub mod orchestrator;
pub mod prompt_builder;
pub mod region_encoder;
pub mod translation_client;

pub use credentials::CredentialStore;
pub use gemini_service::GeminiService;
pub use image_processor::ImageProcessor;
pub use orchestrator::BatchOrchestrator;
pub use translation_client::TranslationClient;
