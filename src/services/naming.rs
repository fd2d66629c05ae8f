// src/services/naming.rs
use crate::models::{GeneratedImage, OutputSettings};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Drops the trailing `.ext` component, if any. A dot inside a directory
/// part is not an extension.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => {
            let ext = &name[idx + 1..];
            if ext.is_empty() || ext.contains('/') {
                name
            } else {
                &name[..idx]
            }
        }
        None => name,
    }
}

pub fn output_file_name(original_name: &str, settings: &OutputSettings) -> String {
    format!(
        "{}{}{}.{}",
        settings.prefix,
        strip_extension(original_name),
        settings.suffix,
        settings.format.extension()
    )
}

/// Name shown in the gallery and offered on download.
pub fn file_name_for(image: &GeneratedImage, settings: &OutputSettings) -> String {
    output_file_name(&image.original_name, settings)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadEntry {
    pub id: Uuid,
    pub file_name: String,
    pub url: String,
    pub delay_ms: u64,
}

/// Download triggers spaced `stagger` apart so hosts that throttle bursts of
/// downloads keep every file.
pub fn download_schedule<'a, I>(images: I, settings: &OutputSettings, stagger: Duration) -> Vec<DownloadEntry>
where
    I: IntoIterator<Item = &'a GeneratedImage>,
{
    let step = stagger.as_millis() as u64;
    images
        .into_iter()
        .enumerate()
        .map(|(i, image)| DownloadEntry {
            id: image.id,
            file_name: file_name_for(image, settings),
            url: format!("/api/v1/results/{}/download", image.id),
            delay_ms: step * i as u64,
        })
        .collect()
}
