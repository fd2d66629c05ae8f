// src/models.rs
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound of the normalized coordinate space.
pub const NORMALIZED_MAX: u32 = 1000;

/// A rectangle in the 0..=1000 normalized space, relative to the image's
/// width (x, width) and height (y, height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Selection {
    pub fn x_max(&self) -> u32 {
        self.x + self.width
    }

    pub fn y_max(&self) -> u32 {
        self.y + self.height
    }

    /// Pulls the box back inside the normalized space. The origin is clamped
    /// first, then the extent is shortened to fit.
    pub fn clamped(self) -> Self {
        let x = self.x.min(NORMALIZED_MAX);
        let y = self.y.min(NORMALIZED_MAX);
        Self {
            x,
            y,
            width: self.width.min(NORMALIZED_MAX - x),
            height: self.height.min(NORMALIZED_MAX - y),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    /// Embedded `data:<mime>;base64,<payload>` form of the image bytes.
    pub data_url: String,
    pub dimensions: (u32, u32),
    /// Empty means the whole image.
    pub selections: Vec<Selection>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedImage {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: &[u8], dimensions: (u32, u32)) -> Self {
        let mime_type = mime_type.into();
        let data_url = format!(
            "data:{};base64,{}",
            mime_type,
            general_purpose::STANDARD.encode(data)
        );
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mime_type,
            data_url,
            dimensions,
            selections: Vec::new(),
            uploaded_at: Utc::now(),
        }
    }

    pub fn summary(&self, selected: bool) -> ImageSummary {
        ImageSummary {
            id: self.id,
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            width: self.dimensions.0,
            height: self.dimensions.1,
            selections: self.selections.clone(),
            selected,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub selections: Vec<Selection>,
    pub selected: bool,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    /// Size hint sent to the generation service. The service has no notion of
    /// "original", so that maps to its smallest tier.
    pub fn service_hint(&self) -> &'static str {
        match self {
            Resolution::Original | Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub prefix: String,
    pub suffix: String,
    pub format: OutputFormat,
    /// Only meaningful for JPEG.
    pub quality: u8,
    pub resolution: Resolution,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            prefix: "translated_".to_string(),
            suffix: String::new(),
            format: OutputFormat::Png,
            quality: 90,
            resolution: Resolution::Original,
        }
    }
}

/// An image returned by the generation service, before it joins the gallery.
#[derive(Debug, Clone)]
pub struct GeneratedImageCandidate {
    pub original_image_id: Uuid,
    pub original_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl GeneratedImageCandidate {
    pub fn into_generated(self, description: impl Into<String>) -> GeneratedImage {
        GeneratedImage {
            id: Uuid::new_v4(),
            original_image_id: self.original_image_id,
            original_name: self.original_name,
            mime_type: self.mime_type,
            data: self.data,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedImage {
    pub id: Uuid,
    /// Lookup only. The source image may have been removed since.
    pub original_image_id: Uuid,
    pub original_name: String,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Bytes,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GalleryEntry {
    #[serde(flatten)]
    pub image: GeneratedImage,
    pub file_name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Idle,
    Processing,
    Completed,
    Error,
}

impl ProcessingStatus {
    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (ProcessingStatus::Idle, ProcessingStatus::Processing)
                | (ProcessingStatus::Processing, ProcessingStatus::Completed)
                | (ProcessingStatus::Processing, ProcessingStatus::Error)
                | (ProcessingStatus::Completed, ProcessingStatus::Processing)
                | (ProcessingStatus::Error, ProcessingStatus::Processing)
        )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Idle => write!(f, "IDLE"),
            ProcessingStatus::Processing => write!(f, "PROCESSING"),
            ProcessingStatus::Completed => write!(f, "COMPLETED"),
            ProcessingStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Output of one remote call covering a set of images.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub text_response: String,
    pub generated_images: Vec<GeneratedImageCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_batch_lifecycle() {
        use ProcessingStatus::*;
        assert!(Idle.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Error));
        assert!(Completed.can_transition_to(Processing));
        assert!(Error.can_transition_to(Processing));

        assert!(!Processing.can_transition_to(Processing));
        assert!(!Idle.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Idle));
        assert!(!Error.can_transition_to(Completed));
    }

    #[test]
    fn original_resolution_maps_to_service_floor() {
        assert_eq!(Resolution::Original.service_hint(), "1K");
        assert_eq!(Resolution::TwoK.service_hint(), "2K");
        assert_eq!(Resolution::FourK.service_hint(), "4K");
    }

    #[test]
    fn settings_deserialize_from_wire_names() {
        let settings: OutputSettings = serde_json::from_value(serde_json::json!({
            "prefix": "tr_",
            "suffix": "",
            "format": "jpeg",
            "quality": 80,
            "resolution": "2K"
        }))
        .unwrap();
        assert_eq!(settings.format, OutputFormat::Jpeg);
        assert_eq!(settings.resolution, Resolution::TwoK);
    }

    #[test]
    fn clamped_selection_stays_inside_normalized_space() {
        let sel = Selection { x: 900, y: 1200, width: 300, height: 50 }.clamped();
        assert_eq!(sel, Selection { x: 900, y: 1000, width: 100, height: 0 });
    }

    #[test]
    fn uploaded_image_embeds_data_url() {
        let img = UploadedImage::new("a.png", "image/png", b"abc", (1, 1));
        assert_eq!(img.data_url, "data:image/png;base64,YWJj");
        assert!(img.selections.is_empty());
    }
}
