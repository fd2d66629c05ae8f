// src/services/orchestrator.rs
// Session state and the batch state machine driven by "start translation".
use crate::errors::TranslateError;
use crate::models::{
    GalleryEntry, GeneratedImage, ImageSummary, Message, MessageRole, OutputSettings,
    ProcessingStatus, Selection, UploadedImage,
};
use crate::services::credentials::CredentialProvider;
use crate::services::naming::{self, DownloadEntry};
use crate::services::prompt_builder;
use crate::services::translation_client::{DEFAULT_BATCH_TEXT, TranslationClient};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const WELCOME_MESSAGE: &str =
    "Ready for translation. Upload images and select target languages to begin.";
pub const DEFAULT_COMPLETION_TEXT: &str = "Translation complete.";

pub const COMMON_LANGUAGES: [&str; 8] = [
    "Spanish",
    "French",
    "German",
    "Italian",
    "Chinese",
    "Japanese",
    "Korean",
    "Portuguese",
];

struct Session {
    uploaded_images: Vec<UploadedImage>,
    selected_image_ids: Vec<Uuid>,
    target_languages: Vec<String>,
    /// Most recent batch first.
    generated_images: Vec<GeneratedImage>,
    selected_generated_ids: Vec<Uuid>,
    messages: Vec<Message>,
    status: ProcessingStatus,
    error_message: Option<String>,
    output_settings: OutputSettings,
    cancel: Option<CancellationToken>,
    started_at: Option<DateTime<Utc>>,
}

impl Session {
    fn new() -> Self {
        Self {
            uploaded_images: Vec::new(),
            selected_image_ids: Vec::new(),
            target_languages: Vec::new(),
            generated_images: Vec::new(),
            selected_generated_ids: Vec::new(),
            messages: vec![Message::new(MessageRole::Model, WELCOME_MESSAGE)],
            status: ProcessingStatus::Idle,
            error_message: None,
            output_settings: OutputSettings::default(),
            cancel: None,
            started_at: None,
        }
    }

    fn can_start(&self) -> bool {
        self.status != ProcessingStatus::Processing && !self.selected_image_ids.is_empty()
    }

    fn set_status(&mut self, next: ProcessingStatus) {
        if !self.status.can_transition_to(next) {
            warn!("Ignoring invalid status transition {} -> {}", self.status, next);
            return;
        }
        info!("Status {} -> {}", self.status, next);
        self.status = next;
    }

    fn image_mut(&mut self, id: Uuid) -> Result<&mut UploadedImage, TranslateError> {
        self.uploaded_images
            .iter_mut()
            .find(|img| img.id == id)
            .ok_or_else(|| TranslateError::NotFound(format!("image {}", id)))
    }
}

fn toggle(ids: &mut Vec<Uuid>, id: Uuid) -> bool {
    if let Some(pos) = ids.iter().position(|x| *x == id) {
        ids.remove(pos);
        false
    } else {
        ids.push(id);
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub messages: Vec<Message>,
}

/// Everything one batch needs, captured when it starts so later session
/// edits do not leak into a running batch.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub instruction: String,
    pub images: Vec<UploadedImage>,
    pub languages: Vec<String>,
    pub settings: OutputSettings,
    cancel: CancellationToken,
}

pub struct BatchOrchestrator {
    session: RwLock<Session>,
    client: TranslationClient,
    credentials: Arc<dyn CredentialProvider>,
    download_stagger: Duration,
}

impl BatchOrchestrator {
    pub fn new(
        client: TranslationClient,
        credentials: Arc<dyn CredentialProvider>,
        download_stagger: Duration,
    ) -> Self {
        Self {
            session: RwLock::new(Session::new()),
            client,
            credentials,
            download_stagger,
        }
    }

    // ---- batch lifecycle ----

    /// Moves the session into `PROCESSING` and captures the batch plan.
    /// Returns `Ok(None)` when there is nothing to do: a batch is already
    /// running or no image is selected.
    pub async fn begin(&self, instruction: &str) -> Result<Option<BatchPlan>, TranslateError> {
        if !self.session.read().await.can_start() {
            return Ok(None);
        }

        if !self.credentials.has_credential().await && !self.credentials.request_credential().await {
            return Err(TranslateError::Credential(
                "No API credential is configured".to_string(),
            ));
        }

        let mut session = self.session.write().await;
        if !session.can_start() {
            return Ok(None);
        }

        let images: Vec<UploadedImage> = session
            .uploaded_images
            .iter()
            .filter(|img| session.selected_image_ids.contains(&img.id))
            .cloned()
            .collect();
        let languages = session.target_languages.clone();
        let instruction = instruction.trim().to_string();

        let display_prompt = if languages.is_empty() {
            if instruction.is_empty() {
                "Translate selected images".to_string()
            } else {
                instruction.clone()
            }
        } else {
            format!("Translating into: {}. {}", languages.join(", "), instruction)
        };

        let cancel = CancellationToken::new();
        session.set_status(ProcessingStatus::Processing);
        session.error_message = None;
        session.cancel = Some(cancel.clone());
        session.started_at = Some(Utc::now());
        session.messages.push(Message::new(MessageRole::User, display_prompt));

        info!(
            "Starting batch: {} image(s), {} language(s)",
            images.len(),
            languages.len()
        );

        Ok(Some(BatchPlan {
            instruction,
            images,
            languages,
            settings: session.output_settings.clone(),
            cancel,
        }))
    }

    /// Runs a plan from [`begin`](Self::begin) to completion or failure.
    pub async fn run(&self, plan: BatchPlan) -> ProcessingStatus {
        let started = Instant::now();
        let outcome = self.execute(&plan).await;

        let mut session = self.session.write().await;
        session.cancel = None;
        match outcome {
            Ok(text) => {
                let text = if text.is_empty() {
                    DEFAULT_COMPLETION_TEXT.to_string()
                } else {
                    text
                };
                session.set_status(ProcessingStatus::Completed);
                session.messages.push(Message::new(MessageRole::Model, text));
                info!("Batch completed in {}ms", started.elapsed().as_millis());
            }
            Err(err) => {
                error!("Batch failed: {}", err);
                if matches!(err, TranslateError::Credential(_)) {
                    drop(session);
                    self.credentials.invalidate().await;
                    if !self.credentials.request_credential().await {
                        warn!("Credential re-prompt left no usable credential");
                    }
                    session = self.session.write().await;
                }
                session.set_status(ProcessingStatus::Error);
                session.error_message = Some(err.to_string());
            }
        }
        session.status
    }

    /// Starts and awaits a batch. `Ok(None)` means the request was a no-op.
    pub async fn start(&self, instruction: &str) -> Result<Option<ProcessingStatus>, TranslateError> {
        match self.begin(instruction).await? {
            Some(plan) => Ok(Some(self.run(plan).await)),
            None => Ok(None),
        }
    }

    pub async fn cancel(&self) -> bool {
        let session = self.session.read().await;
        match (&session.cancel, session.status) {
            (Some(token), ProcessingStatus::Processing) => {
                info!("Cancelling running batch");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    async fn execute(&self, plan: &BatchPlan) -> Result<String, TranslateError> {
        if plan.languages.is_empty() {
            let instruction = prompt_builder::effective_instruction(&plan.instruction);
            let result = self
                .client
                .translate_images(instruction, &plan.images, &plan.settings, &plan.cancel)
                .await?;
            let generated = result
                .generated_images
                .into_iter()
                .map(|c| c.into_generated(instruction))
                .collect();
            self.prepend_generated(generated).await;
            return Ok(result.text_response);
        }

        let mut combined = String::new();
        for language in &plan.languages {
            if plan.cancel.is_cancelled() {
                return Err(TranslateError::Cancelled);
            }
            info!("Language pass: {}", language);
            let prompt = prompt_builder::language_instruction(language, &plan.instruction);
            let result = self
                .client
                .translate_images(&prompt, &plan.images, &plan.settings, &plan.cancel)
                .await?;
            let description = format!("Translated to {}", language);
            let generated = result
                .generated_images
                .into_iter()
                .map(|c| c.into_generated(description.as_str()))
                .collect();
            self.prepend_generated(generated).await;
            combined.push_str(&format!("[{}] Processed.\n", language));
            if result.text_response != DEFAULT_BATCH_TEXT {
                combined.push_str(&result.text_response);
                combined.push('\n');
            }
        }
        Ok(combined)
    }

    async fn prepend_generated(&self, generated: Vec<GeneratedImage>) {
        let mut session = self.session.write().await;
        session.generated_images.splice(0..0, generated);
    }

    pub async fn status(&self) -> StatusSnapshot {
        let session = self.session.read().await;
        StatusSnapshot {
            status: session.status,
            error_message: session.error_message.clone(),
            started_at: session.started_at,
            messages: session.messages.clone(),
        }
    }

    // ---- source images ----

    pub async fn add_images(&self, images: Vec<UploadedImage>) -> Vec<Uuid> {
        let mut session = self.session.write().await;
        let ids: Vec<Uuid> = images.iter().map(|img| img.id).collect();
        session.uploaded_images.extend(images);
        session.selected_image_ids.extend(ids.iter().copied());
        ids
    }

    pub async fn list_images(&self) -> Vec<ImageSummary> {
        let session = self.session.read().await;
        session
            .uploaded_images
            .iter()
            .map(|img| img.summary(session.selected_image_ids.contains(&img.id)))
            .collect()
    }

    pub async fn remove_image(&self, id: Uuid) -> Result<(), TranslateError> {
        let mut session = self.session.write().await;
        let before = session.uploaded_images.len();
        session.uploaded_images.retain(|img| img.id != id);
        if session.uploaded_images.len() == before {
            return Err(TranslateError::NotFound(format!("image {}", id)));
        }
        session.selected_image_ids.retain(|x| *x != id);
        Ok(())
    }

    /// Returns whether the image is selected afterwards.
    pub async fn toggle_image(&self, id: Uuid) -> Result<bool, TranslateError> {
        let mut session = self.session.write().await;
        session.image_mut(id)?;
        Ok(toggle(&mut session.selected_image_ids, id))
    }

    pub async fn set_selections(&self, id: Uuid, selections: Vec<Selection>) -> Result<Vec<Selection>, TranslateError> {
        let mut session = self.session.write().await;
        let image = session.image_mut(id)?;
        image.selections = selections.into_iter().map(Selection::clamped).collect();
        Ok(image.selections.clone())
    }

    pub async fn selections(&self, id: Uuid) -> Result<Vec<Selection>, TranslateError> {
        let session = self.session.read().await;
        session
            .uploaded_images
            .iter()
            .find(|img| img.id == id)
            .map(|img| img.selections.clone())
            .ok_or_else(|| TranslateError::NotFound(format!("image {}", id)))
    }

    // ---- target languages ----

    pub async fn languages(&self) -> Vec<String> {
        self.session.read().await.target_languages.clone()
    }

    /// Adds a trimmed language. Blank and duplicate entries are ignored.
    pub async fn add_language(&self, language: &str) -> bool {
        let language = language.trim();
        let mut session = self.session.write().await;
        if language.is_empty() || session.target_languages.iter().any(|l| l == language) {
            return false;
        }
        session.target_languages.push(language.to_string());
        true
    }

    pub async fn remove_language(&self, language: &str) -> bool {
        let mut session = self.session.write().await;
        let before = session.target_languages.len();
        session.target_languages.retain(|l| l != language.trim());
        session.target_languages.len() != before
    }

    pub async fn set_languages(&self, languages: Vec<String>) -> Vec<String> {
        let mut cleaned: Vec<String> = Vec::with_capacity(languages.len());
        for language in languages {
            let language = language.trim();
            if !language.is_empty() && !cleaned.iter().any(|l| l == language) {
                cleaned.push(language.to_string());
            }
        }
        let mut session = self.session.write().await;
        session.target_languages = cleaned.clone();
        cleaned
    }

    // ---- output settings ----

    pub async fn settings(&self) -> OutputSettings {
        self.session.read().await.output_settings.clone()
    }

    pub async fn update_settings(&self, settings: OutputSettings) -> Result<OutputSettings, TranslateError> {
        if !(1..=100).contains(&settings.quality) {
            return Err(TranslateError::Validation(format!(
                "quality must be between 1 and 100, got {}",
                settings.quality
            )));
        }
        if settings.prefix.chars().chain(settings.suffix.chars()).any(char::is_control) {
            return Err(TranslateError::Validation(
                "prefix and suffix must not contain control characters".to_string(),
            ));
        }
        self.session.write().await.output_settings = settings.clone();
        Ok(settings)
    }

    // ---- results gallery ----

    pub async fn gallery(&self) -> Vec<GalleryEntry> {
        let session = self.session.read().await;
        session
            .generated_images
            .iter()
            .map(|img| GalleryEntry {
                file_name: naming::file_name_for(img, &session.output_settings),
                selected: session.selected_generated_ids.contains(&img.id),
                image: img.clone(),
            })
            .collect()
    }

    /// A generated image with its output name under the current settings.
    pub async fn generated(&self, id: Uuid) -> Result<(GeneratedImage, String, OutputSettings), TranslateError> {
        let session = self.session.read().await;
        let image = session
            .generated_images
            .iter()
            .find(|img| img.id == id)
            .cloned()
            .ok_or_else(|| TranslateError::NotFound(format!("result {}", id)))?;
        let name = naming::file_name_for(&image, &session.output_settings);
        Ok((image, name, session.output_settings.clone()))
    }

    pub async fn toggle_generated(&self, id: Uuid) -> Result<bool, TranslateError> {
        let mut session = self.session.write().await;
        if !session.generated_images.iter().any(|img| img.id == id) {
            return Err(TranslateError::NotFound(format!("result {}", id)));
        }
        Ok(toggle(&mut session.selected_generated_ids, id))
    }

    pub async fn select_all_generated(&self) -> usize {
        let mut session = self.session.write().await;
        session.selected_generated_ids = session.generated_images.iter().map(|img| img.id).collect();
        session.selected_generated_ids.len()
    }

    /// Staggered download plan for the selected results, in gallery order.
    pub async fn download_schedule(&self) -> Vec<DownloadEntry> {
        let session = self.session.read().await;
        let selected = session
            .generated_images
            .iter()
            .filter(|img| session.selected_generated_ids.contains(&img.id));
        naming::download_schedule(selected, &session.output_settings, self.download_stagger)
    }
}
