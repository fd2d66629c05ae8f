// src/services/translation_client.rs
use crate::errors::TranslateError;
use crate::models::{BatchResult, GeneratedImageCandidate, OutputSettings, UploadedImage};
use crate::services::gemini_service::{GenerationRequest, ImageGenerator, ResponsePart};
use crate::services::prompt_builder;
use log::{info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_TEXT: &str = "Batch translation complete.";
const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Splits `data:<mime>;base64,<payload>` into its mime type and payload.
pub fn decode_data_url(data_url: &str) -> Result<(&str, &str), TranslateError> {
    let invalid = || TranslateError::InvalidEncoding("Invalid base64 string".to_string());
    if data_url.contains('\n') {
        return Err(invalid());
    }
    let rest = data_url.strip_prefix("data:").ok_or_else(invalid)?;
    let (mime_type, payload) = rest.rsplit_once(";base64,").ok_or_else(invalid)?;
    if mime_type.is_empty() || payload.is_empty() {
        return Err(invalid());
    }
    Ok((mime_type, payload))
}

#[derive(Debug, Clone)]
pub struct ImageTranslation {
    pub image_name: String,
    pub candidates: Vec<GeneratedImageCandidate>,
    pub notes: Vec<String>,
}

#[derive(Debug)]
pub struct ImageFailure {
    pub image_name: String,
    pub error: TranslateError,
}

pub type ImageOutcome = Result<ImageTranslation, ImageFailure>;

/// Folds per-image outcomes into one result, attributing every text line to
/// the image it came from.
pub fn aggregate(outcomes: Vec<ImageOutcome>) -> BatchResult {
    let mut text = String::new();
    let mut generated_images = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(translation) => {
                for note in &translation.notes {
                    text.push_str(&format!("[{}] {}\n", translation.image_name, note));
                }
                generated_images.extend(translation.candidates);
            }
            Err(failure) => {
                text.push_str(&format!(
                    "Error processing {}: {}\n",
                    failure.image_name, failure.error
                ));
            }
        }
    }

    let trimmed = text.trim();
    BatchResult {
        text_response: if trimmed.is_empty() {
            DEFAULT_BATCH_TEXT.to_string()
        } else {
            trimmed.to_string()
        },
        generated_images,
    }
}

#[derive(Clone)]
pub struct TranslationClient {
    generator: Arc<dyn ImageGenerator>,
}

impl TranslationClient {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self { generator }
    }

    pub async fn translate_one(
        &self,
        instruction: &str,
        image: &UploadedImage,
        settings: &OutputSettings,
    ) -> Result<ImageTranslation, TranslateError> {
        let (mime_type, data) = decode_data_url(&image.data_url)?;
        let prompt = prompt_builder::build(instruction, image, settings);

        let parts = self
            .generator
            .generate(GenerationRequest {
                mime_type,
                data,
                prompt: &prompt.text,
                image_size: prompt.image_size,
            })
            .await?;

        let mut translation = ImageTranslation {
            image_name: image.name.clone(),
            candidates: Vec::new(),
            notes: Vec::new(),
        };
        for part in parts {
            match part {
                ResponsePart::Image { mime_type, data } => {
                    translation.candidates.push(GeneratedImageCandidate {
                        original_image_id: image.id,
                        original_name: image.name.clone(),
                        mime_type: mime_type.unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
                        data,
                    })
                }
                ResponsePart::Text(text) => translation.notes.push(text),
            }
        }
        Ok(translation)
    }

    /// Runs every image in turn. Encoding, remote and image-processing
    /// failures stay local to their image as [`ImageFailure`]s. A rejected
    /// credential or a cancellation stops the call, and any other error stops
    /// it as [`TranslateError::Batch`].
    pub async fn translate_each(
        &self,
        instruction: &str,
        images: &[UploadedImage],
        settings: &OutputSettings,
        cancel: &CancellationToken,
    ) -> Result<Vec<ImageOutcome>, TranslateError> {
        let mut outcomes = Vec::with_capacity(images.len());
        for image in images {
            if cancel.is_cancelled() {
                return Err(TranslateError::Cancelled);
            }
            info!("Translating {} ({})", image.name, image.id);
            match self.translate_one(instruction, image, settings).await {
                Ok(translation) => outcomes.push(Ok(translation)),
                Err(
                    error @ (TranslateError::InvalidEncoding(_)
                    | TranslateError::RemoteCall(_)
                    | TranslateError::ImageProcessing(_)),
                ) => {
                    warn!("Error processing {}: {}", image.name, error);
                    outcomes.push(Err(ImageFailure {
                        image_name: image.name.clone(),
                        error,
                    }));
                }
                Err(
                    err @ (TranslateError::Credential(_)
                    | TranslateError::Cancelled
                    | TranslateError::Batch(_)),
                ) => return Err(err),
                Err(other) => return Err(TranslateError::Batch(other.to_string())),
            }
        }
        Ok(outcomes)
    }

    pub async fn translate_images(
        &self,
        instruction: &str,
        images: &[UploadedImage],
        settings: &OutputSettings,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, TranslateError> {
        let outcomes = self.translate_each(instruction, images, settings, cancel).await?;
        Ok(aggregate(outcomes))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    /// In-process generator that records prompts and answers from a script.
    #[derive(Default)]
    pub(crate) struct FakeGenerator {
        pub calls: Mutex<Vec<String>>,
        /// Substring of the prompt that makes the call fail with this error.
        pub fail_on: Mutex<Vec<(String, fn() -> TranslateError)>>,
    }

    impl FakeGenerator {
        pub fn fail_when(&self, needle: &str, make: fn() -> TranslateError) {
            self.fail_on.lock().unwrap().push((needle.to_string(), make));
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageGenerator for FakeGenerator {
        async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<ResponsePart>, TranslateError> {
            self.calls.lock().unwrap().push(request.prompt.to_string());
            let failure = self
                .fail_on
                .lock()
                .unwrap()
                .iter()
                .find(|(needle, _)| request.prompt.contains(needle.as_str()))
                .map(|(_, make)| make());
            if let Some(err) = failure {
                return Err(err);
            }
            Ok(vec![
                ResponsePart::Image {
                    mime_type: None,
                    data: Bytes::from_static(b"generated"),
                },
                ResponsePart::Text("done".to_string()),
            ])
        }
    }

    fn image(name: &str) -> UploadedImage {
        UploadedImage::new(name, "image/png", b"source", (8, 8))
    }

    #[test]
    fn data_url_shape_is_enforced() {
        assert_eq!(
            decode_data_url("data:image/png;base64,AAAA").unwrap(),
            ("image/png", "AAAA")
        );
        for bad in ["image/png;base64,AAAA", "data:;base64,AAAA", "data:image/png;base64,", "data:image/png,AAAA"] {
            assert_matches!(decode_data_url(bad), Err(TranslateError::InvalidEncoding(_)), "{bad}");
        }
    }

    #[test]
    fn aggregate_attributes_text_and_defaults_when_silent() {
        let result = aggregate(vec![
            Ok(ImageTranslation {
                image_name: "a.png".into(),
                candidates: vec![],
                notes: vec!["looks good".into()],
            }),
            Err(ImageFailure {
                image_name: "b.png".into(),
                error: TranslateError::RemoteCall("quota".into()),
            }),
        ]);
        assert_eq!(result.text_response, "[a.png] looks good\nError processing b.png: quota");

        assert_eq!(aggregate(vec![]).text_response, DEFAULT_BATCH_TEXT);
    }

    #[tokio::test]
    async fn bad_encoding_does_not_block_other_images() {
        let fake = Arc::new(FakeGenerator::default());
        let client = TranslationClient::new(fake.clone());
        let mut broken = image("broken.jpg");
        broken.data_url = "not a data url".to_string();
        let images = vec![image("first.png"), broken, image("last.png")];

        let result = client
            .translate_images("go", &images, &OutputSettings::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fake.call_count(), 2);
        assert_eq!(result.generated_images.len(), 2);
        assert_eq!(result.generated_images[0].mime_type, "image/png");
        assert_eq!(result.generated_images[1].original_name, "last.png");
        assert!(result.text_response.contains("Error processing broken.jpg: Invalid image encoding"));
        assert!(result.text_response.contains("[first.png] done"));
    }

    #[tokio::test]
    async fn remote_failure_is_downgraded_to_text() {
        let fake = Arc::new(FakeGenerator::default());
        fake.fail_when("TASK", || TranslateError::RemoteCall("model overloaded".into()));
        let client = TranslationClient::new(fake.clone());

        let result = client
            .translate_images("go", &[image("x.png")], &OutputSettings::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.generated_images.is_empty());
        assert_eq!(result.text_response, "Error processing x.png: model overloaded");
    }

    #[tokio::test]
    async fn credential_rejection_stops_the_call() {
        let fake = Arc::new(FakeGenerator::default());
        fake.fail_when("TASK", || TranslateError::Credential("Requested entity was not found".into()));
        let client = TranslationClient::new(fake.clone());

        let err = client
            .translate_images("go", &[image("a.png"), image("b.png")], &OutputSettings::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_matches!(err, TranslateError::Credential(_));
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn unexpected_error_stops_the_call_as_batch_error() {
        let fake = Arc::new(FakeGenerator::default());
        fake.fail_when("TASK", || TranslateError::NotFound("model".into()));
        let client = TranslationClient::new(fake.clone());

        let err = client
            .translate_images("go", &[image("a.png"), image("b.png")], &OutputSettings::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_matches!(&err, TranslateError::Batch(msg) if msg == "Not found: model");
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_next_image() {
        let fake = Arc::new(FakeGenerator::default());
        let client = TranslationClient::new(fake.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = client
            .translate_images("go", &[image("a.png")], &OutputSettings::default(), &token)
            .await
            .unwrap_err();
        assert_matches!(err, TranslateError::Cancelled);
        assert_eq!(fake.call_count(), 0);
    }
}
