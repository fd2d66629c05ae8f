// src/handlers.rs
use crate::services::orchestrator::COMMON_LANGUAGES;
use crate::services::region_encoder::{self, DisplaySize, DragGesture};
use crate::{AppState, errors::TranslateError, models::*};
use actix_multipart::Multipart;
use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use log::{info, warn};
use serde::Deserialize;
use uuid::Uuid;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/upload", web::post().to(upload_images))
            .route("/images", web::get().to(list_images))
            .route("/images/{image_id}", web::delete().to(remove_image))
            .route("/images/{image_id}/toggle", web::post().to(toggle_image))
            .route("/images/{image_id}/selections", web::put().to(update_selections))
            .route("/images/{image_id}/selections", web::get().to(selection_overlay))
            .route("/languages", web::get().to(list_languages))
            .route("/languages", web::put().to(replace_languages))
            .route("/languages", web::post().to(add_language))
            .route("/languages/{language}", web::delete().to(remove_language))
            .route("/settings", web::get().to(get_settings))
            .route("/settings", web::put().to(update_settings))
            .route("/translate", web::post().to(start_translation))
            .route("/cancel", web::post().to(cancel_translation))
            .route("/status", web::get().to(get_status))
            .route("/results", web::get().to(list_results))
            .route("/results/select-all", web::post().to(select_all_results))
            .route("/results/download", web::post().to(download_selected))
            .route("/results/{result_id}/toggle", web::post().to(toggle_result))
            .route("/results/{result_id}/download", web::get().to(download_result))
            .route("/credential", web::put().to(set_credential)),
    );
}

pub async fn upload_images(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut images = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        let content_disposition = field.content_disposition();
        let filename = content_disposition
            .get_filename()
            .ok_or_else(|| TranslateError::Validation("No filename provided".to_string()))?
            .to_string();

        if let Some(ct) = field.content_type() {
            if ct.type_().as_str() != "image" && ct.essence_str() != "application/octet-stream" {
                warn!("Skipping non-image upload {} ({})", filename, ct);
                continue;
            }
        }

        let mut image_data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            image_data.extend_from_slice(&chunk);
        }

        let prepared = data.image_processor.prepare_upload(&image_data)?;
        images.push(UploadedImage::new(
            filename,
            prepared.mime_type,
            &prepared.data,
            (prepared.width, prepared.height),
        ));
    }

    let ids = data.orchestrator.add_images(images).await;
    info!("Ingested {} image(s)", ids.len());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "uploaded_images": ids,
        "count": ids.len()
    })))
}

pub async fn list_images(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.orchestrator.list_images().await)
}

pub async fn remove_image(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    data.orchestrator.remove_image(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn toggle_image(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let selected = data.orchestrator.toggle_image(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "selected": selected })))
}

#[derive(Debug, Deserialize)]
pub struct SelectionUpdate {
    /// Rendered size of the image when the gestures finished.
    pub display: DisplaySize,
    pub drags: Vec<DragGesture>,
}

pub async fn update_selections(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<SelectionUpdate>,
) -> Result<HttpResponse, Error> {
    let update = body.into_inner();
    let encoded = region_encoder::encode_drags(&update.drags, update.display);
    let stored = data
        .orchestrator
        .set_selections(path.into_inner(), encoded)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "selections": stored })))
}

#[derive(Debug, Deserialize)]
pub struct OverlayQuery {
    pub width: f64,
    pub height: f64,
}

pub async fn selection_overlay(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    query: web::Query<OverlayQuery>,
) -> Result<HttpResponse, Error> {
    let size = DisplaySize {
        width: query.width,
        height: query.height,
    };
    let selections = data.orchestrator.selections(path.into_inner()).await?;
    let rects: Vec<_> = selections
        .iter()
        .map(|s| region_encoder::denormalize(s, size))
        .collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "selections": selections,
        "overlay": rects
    })))
}

pub async fn list_languages(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "languages": data.orchestrator.languages().await,
        "common": COMMON_LANGUAGES
    }))
}

#[derive(Debug, Deserialize)]
pub struct LanguagesBody {
    pub languages: Vec<String>,
}

pub async fn replace_languages(
    data: web::Data<AppState>,
    body: web::Json<LanguagesBody>,
) -> HttpResponse {
    let languages = data.orchestrator.set_languages(body.into_inner().languages).await;
    HttpResponse::Ok().json(serde_json::json!({ "languages": languages }))
}

#[derive(Debug, Deserialize)]
pub struct LanguageBody {
    pub language: String,
}

pub async fn add_language(data: web::Data<AppState>, body: web::Json<LanguageBody>) -> HttpResponse {
    let added = data.orchestrator.add_language(&body.language).await;
    HttpResponse::Ok().json(serde_json::json!({
        "added": added,
        "languages": data.orchestrator.languages().await
    }))
}

pub async fn remove_language(path: web::Path<String>, data: web::Data<AppState>) -> HttpResponse {
    let removed = data.orchestrator.remove_language(&path.into_inner()).await;
    HttpResponse::Ok().json(serde_json::json!({
        "removed": removed,
        "languages": data.orchestrator.languages().await
    }))
}

pub async fn get_settings(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.orchestrator.settings().await)
}

pub async fn update_settings(
    data: web::Data<AppState>,
    body: web::Json<OutputSettings>,
) -> Result<HttpResponse, Error> {
    let settings = data.orchestrator.update_settings(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[derive(Debug, Default, Deserialize)]
pub struct TranslateBody {
    #[serde(default)]
    pub instruction: String,
}

pub async fn start_translation(
    data: web::Data<AppState>,
    body: Option<web::Json<TranslateBody>>,
) -> Result<HttpResponse, Error> {
    let instruction = body.map(|b| b.into_inner().instruction).unwrap_or_default();

    match data.orchestrator.begin(&instruction).await? {
        Some(plan) => {
            let orchestrator = data.orchestrator.clone();
            actix_web::rt::spawn(async move {
                orchestrator.run(plan).await;
            });
            Ok(HttpResponse::Accepted().json(serde_json::json!({
                "started": true,
                "status": ProcessingStatus::Processing
            })))
        }
        None => {
            let snapshot = data.orchestrator.status().await;
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "started": false,
                "status": snapshot.status
            })))
        }
    }
}

pub async fn cancel_translation(data: web::Data<AppState>) -> HttpResponse {
    let cancelled = data.orchestrator.cancel().await;
    HttpResponse::Ok().json(serde_json::json!({ "cancelled": cancelled }))
}

pub async fn get_status(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.orchestrator.status().await)
}

pub async fn list_results(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.orchestrator.gallery().await)
}

pub async fn toggle_result(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let selected = data.orchestrator.toggle_generated(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "selected": selected })))
}

pub async fn select_all_results(data: web::Data<AppState>) -> HttpResponse {
    let count = data.orchestrator.select_all_generated().await;
    HttpResponse::Ok().json(serde_json::json!({ "selected": count }))
}

pub async fn download_selected(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "downloads": data.orchestrator.download_schedule().await
    }))
}

pub async fn download_result(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (image, file_name, settings) = data.orchestrator.generated(path.into_inner()).await?;

    let (content_type, body) = match data.image_processor.encode_for_download(&image.data, &settings) {
        Ok(encoded) => (settings.format.mime_type().to_string(), encoded),
        Err(e) => {
            warn!("Serving {} unconverted: {}", image.id, e);
            (image.mime_type.clone(), image.data.to_vec())
        }
    };

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(attachment(&file_name))
        .body(body))
}

/// `Content-Disposition` for a download. `filename` carries a printable ASCII
/// fallback and `filename*` the exact UTF-8 name.
fn attachment(file_name: &str) -> ContentDisposition {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![
            DispositionParam::Filename(fallback),
            DispositionParam::FilenameExt(ExtendedValue {
                charset: Charset::Ext("UTF-8".to_string()),
                language_tag: None,
                value: file_name.as_bytes().to_vec(),
            }),
        ],
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialBody {
    pub api_key: String,
}

pub async fn set_credential(
    data: web::Data<AppState>,
    body: web::Json<CredentialBody>,
) -> Result<HttpResponse, Error> {
    if !data.credentials.set(body.into_inner().api_key).await {
        return Err(TranslateError::Validation("api_key must not be empty".to_string()).into());
    }
    Ok(HttpResponse::NoContent().finish())
}
